//! Log setup for the `mka` binary.

use chrono::Local;
use env_logger::fmt::style::Style;
use env_logger::WriteStyle;
use log::{Level, LevelFilter};
use std::io::Write;

fn level_label(level: Level, style: Style) -> String {
    format!("{style}{level}{style:#}")
}

/// Timestamped log lines on stderr, with the level coloured when stderr is a
/// terminal. `verbose` selects debug output; `RUST_LOG` overrides either level.
pub fn init_log(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                level_label(record.level(), style),
                record.args()
            )
        })
        .filter_level(level)
        .write_style(WriteStyle::Auto)
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
mod test {
    use super::*;
    use env_logger::fmt::style::{AnsiColor, Effects};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_label() {
        assert_eq!(level_label(Level::Info, Style::new()), "INFO");

        let red = Style::new()
            .fg_color(Some(AnsiColor::Red.into()))
            .effects(Effects::BOLD);
        let label = level_label(Level::Error, red);
        assert!(label.starts_with("\u{1b}["));
        assert!(label.contains("ERROR"));
        assert!(label.ends_with("\u{1b}[0m"));
    }
}
