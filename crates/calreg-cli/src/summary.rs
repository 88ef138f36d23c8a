use console::Style;

use calreg_core::pipeline::{MoviePaths, RegistrationOutcome};
use calreg_core::config::RegistrationConfig;

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

pub fn print_register_summary(config: &RegistrationConfig, paths: &MoviePaths, device_name: &str) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Calreg Registration"));
    println!(
        "  {}",
        s.title
            .apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}")
    );
    println!();

    let input = paths.raw.as_ref().unwrap_or(&paths.reg);
    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(paths.reg.display())
    );
    if let Some(ref chan2) = paths.reg_chan2 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Channel 2"),
            s.path.apply_to(chan2.display())
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Device"),
        s.method.apply_to(device_name)
    );
    println!();

    println!("  {}", s.header.apply_to("Alignment"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Frame"),
        s.value.apply_to(format!("{}x{}", config.lx, config.ly))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Batch"),
        s.value.apply_to(config.batch_size)
    );
    if config.n_channels > 1 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Channels"),
            s.value
                .apply_to(format!("{} (align on {})", config.n_channels, config.align_channel))
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max shift"),
        s.value
            .apply_to(format!("{:.0}%", config.max_shift_fraction * 100.0))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Smoothing"),
        s.value.apply_to(format!("{} px", config.smooth_sigma))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Phase norm"),
        if config.phase_correlation {
            s.method.apply_to("enabled".to_string())
        } else {
            s.disabled.apply_to("disabled".to_string())
        }
    );
    println!();

    if config.one_photon.enabled {
        println!("  {}", s.header.apply_to("One-photon"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("High-pass"),
            s.value.apply_to(format!("{} px", config.one_photon.spatial_hp))
        );
        if config.one_photon.pre_smooth > 0 {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Pre-smooth"),
                s.value
                    .apply_to(format!("{} px", config.one_photon.pre_smooth))
            );
        }
        println!();
    }

    if config.bidiphase.enabled {
        let desc = match config.bidiphase.offset {
            Some(b) => format!("fixed {} px", b),
            None => "estimated".to_string(),
        };
        println!(
            "  {:<14}{}",
            s.header.apply_to("Bidiphase"),
            s.method.apply_to(desc)
        );
    } else {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Bidiphase"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_outcome_summary(outcome: &RegistrationOutcome) {
    let s = Styles::new();
    let n = outcome.yoff.len();
    let n_bad = outcome.badframes.iter().filter(|&&b| b).count();
    let mean_corr = if n > 0 {
        outcome.corr.iter().sum::<f32>() / n as f32
    } else {
        0.0
    };
    let max_shift = outcome
        .yoff
        .iter()
        .zip(&outcome.xoff)
        .map(|(&y, &x)| y.abs().max(x.abs()))
        .max()
        .unwrap_or(0);

    println!();
    println!("  {}", s.header.apply_to("Results"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(n)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bad frames"),
        if n_bad == 0 {
            s.method.apply_to("none".to_string())
        } else {
            s.disabled.apply_to(n_bad.to_string())
        }
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Mean corr"),
        s.value.apply_to(format!("{:.4}", mean_corr))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max shift"),
        s.value.apply_to(format!("{} px", max_shift))
    );
    if outcome.bidiphase != 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Bidiphase"),
            s.value.apply_to(format!("{} px", outcome.bidiphase))
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Crop rows"),
        s.value
            .apply_to(format!("{}..{}", outcome.yrange[0], outcome.yrange[1]))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Crop cols"),
        s.value
            .apply_to(format!("{}..{}", outcome.xrange[0], outcome.xrange[1]))
    );
    println!();
}
