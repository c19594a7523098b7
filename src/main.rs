use clap::Parser;
use marking_desk::utils::error::{ErrorSeverity, MarkingError};
use marking_desk::utils::{logger, validation::Validate};
use marking_desk::{
    CliArgs, Console, GradingSession, MarkStore, MarkStoreBackend, MarkingConfig, ReferenceLoader,
};

fn exit_code(e: &MarkingError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: MarkingError) -> ! {
    tracing::error!(
        "❌ Startup failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e).max(1));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 載入 TOML 配置
    let mut config = match MarkingConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.log_format() == "json" {
        logger::init_json_logger(args.verbose, config.log_level());
    } else {
        logger::init_cli_logger(args.verbose, config.log_level());
    }
    tracing::info!("🚀 Starting marking-desk");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    // 應用命令列覆蓋設定
    args.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(e);
    }

    // 載入參考資料 (roster + responses)，失敗即無法開始
    let loader = ReferenceLoader::new(
        &config.reference.roster_path,
        &config.reference.responses_path,
        config.roster_skip_rows(),
    );
    let reference = loader.load(config.grader()).unwrap_or_else(|e| fail(e));

    // 建立 mark store 與 session
    let store = MarkStoreBackend::from_config(&config).unwrap_or_else(|e| fail(e));
    tracing::info!("🗂️ Mark store: {}", store.location());

    let mut session = GradingSession::new(reference, store);
    if let Err(e) = session.start().await {
        fail(e);
    }

    let mut console = Console::new(session, config.wrap_width());
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    console.run(stdin, &mut stdout).await?;

    tracing::info!("👋 Session closed for grader {}", console.session().grader());
    Ok(())
}
