use console::Style;
use quantmosaic_core::pipeline::config::MosaicConfig;
use quantmosaic_core::pipeline::MosaicSummary;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_mosaic_summary(config: &MosaicConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Quantile Mosaic"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Inputs"),
        s.value.apply_to(config.inputs.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reference"),
        s.path.apply_to(config.reference.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!();

    // Collapse
    println!("  {}", s.header.apply_to("Collapse"));
    let estimator = if config.collapse.weighted {
        format!("weighted q={}", config.collapse.quantile)
    } else {
        "median".to_string()
    };
    println!(
        "    {:<12}{}",
        s.label.apply_to("Estimator"),
        s.method.apply_to(estimator)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Weighting"),
        s.method.apply_to(&config.kernel.weighting)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Nodata"),
        s.value.apply_to(config.collapse.nodata)
    );
    if config.order_by_time {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Order"),
            s.method.apply_to("by acquisition time")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Order"),
            s.disabled.apply_to("as given")
        );
    }
    println!();

    // Feather
    println!("  {}", s.header.apply_to("Feather"));
    if config.feather.enabled {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Distance"),
            s.value.apply_to(config.feather.distance)
        );
    } else {
        println!("    {}", s.disabled.apply_to("disabled"));
    }
    println!();

    // Chunking
    println!("  {}", s.header.apply_to("Chunking"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Chunks"),
        s.value.apply_to(config.chunking.chunks)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Staging"),
        s.method.apply_to(config.chunking.staging)
    );
    if let Some(mb) = config.chunking.memory_budget_mb {
        println!(
            "    {:<12}{} MiB",
            s.label.apply_to("Budget"),
            s.value.apply_to(mb)
        );
    }
    println!();
}

pub fn print_mosaic_result(summary: &MosaicSummary) {
    let s = Styles::new();
    let (rows, cols) = summary.mosaic.dim();
    let valid = summary.mosaic.valid_count();

    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Layers"),
        s.value.apply_to(summary.depth)
    );
    for path in &summary.skipped {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Skipped"),
            s.disabled.apply_to(path.display())
        );
    }
    println!(
        "    {:<12}{} offsets, {} chunk(s)",
        s.label.apply_to("Kernel"),
        s.value.apply_to(summary.kernel_len),
        s.value.apply_to(summary.chunks)
    );
    println!(
        "    {:<12}{} of {} ({:.1}%)",
        s.label.apply_to("Valid"),
        s.value.apply_to(valid),
        rows * cols,
        100.0 * valid as f64 / (rows * cols).max(1) as f64
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Saved"),
        s.path.apply_to(summary.output.display())
    );
    println!();
}
