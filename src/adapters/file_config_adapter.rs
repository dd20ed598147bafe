//! INI file configuration adapter.

use crate::domain::error::RuletraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuletraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| RuletraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RuletraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RuletraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_rules_with_operators() {
        let content = r#"
[strategy]
name = Dip Buyer
buy_rule = rsi(14) <= 30 and close >= sma(200)
sell_rule = rsi(14) > 70
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "buy_rule"),
            Some("rsi(14) <= 30 and close >= sma(200)".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("Dip Buyer".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[screener]\nmax_symbols = 5\nmin_bars = abc\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("screener", "max_symbols", 0), 5);
        assert_eq!(adapter.get_int("screener", "min_bars", 42), 42);
        assert_eq!(adapter.get_int("screener", "missing", 7), 7);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ninitial_capital = 100000.5\nslippage_pct = lots\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_double("backtest", "initial_capital", 0.0),
            100000.5
        );
        assert_eq!(adapter.get_double("backtest", "slippage_pct", 0.1), 0.1);
        assert_eq!(adapter.get_double("backtest", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_optional_double_treats_blank_as_absent() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nstop_loss =\ntake_profit = 0.2\n")
                .unwrap();
        assert_eq!(adapter.get_optional_double("strategy", "stop_loss"), None);
        assert_eq!(
            adapter.get_optional_double("strategy", "take_profit"),
            Some(0.2)
        );
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[screener]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("screener", "a", false));
        assert!(adapter.get_bool("screener", "b", false));
        assert!(adapter.get_bool("screener", "c", false));
        assert!(!adapter.get_bool("screener", "d", true));
        assert!(!adapter.get_bool("screener", "e", true));
        assert!(!adapter.get_bool("screener", "f", true));
        assert!(adapter.get_bool("screener", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\npath = /srv/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/srv/prices".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, RuletraderError::ConfigParse { .. }));
    }
}
