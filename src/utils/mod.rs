use log::SetLoggerError;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode};

/// Print the message to stderr and terminate the process with `code`.
macro_rules! exits {
    ( $code:expr ) => {
        ::std::process::exit($code)
    };

    ( $code:expr, $fmt:expr $( , $arg:expr )* ) => {{
        eprintln!($fmt $( , $arg )*);
        ::std::process::exit($code)
    }};
}

/// Init the terminal logger.
///
/// Logs always go to stderr, stdin and stdout are reserved for test mode.
pub fn init_logger(verbose: u64) -> Result<(), SetLoggerError> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    CombinedLogger::init(vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )])
}

/// Parse an unsigned integer, either decimal or hex with a `0x` prefix.
pub fn parse_num(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::parse_num;

    #[test]
    fn num_parse() {
        assert_eq!(parse_num("39").unwrap(), 39);
        assert_eq!(parse_num(" 0x27 ").unwrap(), 39);
        assert_eq!(parse_num("0XFFFF").unwrap(), 0xffff);
        assert!(parse_num("0x").is_err());
        assert!(parse_num("-1").is_err());
    }
}
