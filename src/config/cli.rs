use crate::config::toml_config::MarkingConfig;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "marking-desk")]
#[command(about = "Interactive marking console backed by a CSV file or a shared spreadsheet")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "marking.toml")]
    pub config: String,

    /// Grader initials, overrides session.grader
    #[arg(short, long)]
    pub grader: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// 應用命令列覆蓋設定
    pub fn apply_overrides(&self, config: &mut MarkingConfig) {
        if let Some(grader) = &self.grader {
            tracing::info!("🔧 Grader overridden to: {}", grader);
            config.session.grader = Some(grader.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grader_override() {
        let mut config = MarkingConfig::from_toml_str(
            r#"
[session]
grader = "VM"

[reference]
roster_path = "groups.csv"
responses_path = "responses.csv"

[store]
type = "local"
path = "scores.csv"
"#,
        )
        .unwrap();

        let args = CliArgs::parse_from(["marking-desk", "--grader", "JD", "-v"]);
        assert_eq!(args.config, "marking.toml");
        assert!(args.verbose);

        args.apply_overrides(&mut config);
        assert_eq!(config.grader(), "JD");
    }
}
