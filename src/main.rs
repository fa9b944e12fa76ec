use std::{process, sync::Arc};

use markpress::{
    application::{
        conversion::ConversionService, error::AppError, limiter::RenderLimiter,
        template::DocumentTemplater,
    },
    config::{self, ConvertArgs, RenderSettings, Settings},
    domain::request::ConversionDraft,
    infra::{
        chrome::{ChromeEngine, ChromeEngineConfig},
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::{io::AsyncReadExt, net::TcpListener};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const STDIN_OUTPUT_NAME: &str = "document.pdf";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
    }
}

fn build_conversion_service(render: &RenderSettings) -> ConversionService {
    let engine = ChromeEngine::new(ChromeEngineConfig {
        executable: render.chrome_path.clone(),
        sandbox: render.sandbox,
        load_timeout: render.load_timeout,
        ..ChromeEngineConfig::default()
    });
    let templater = DocumentTemplater::new(render.font_stylesheet_url.as_ref());

    ConversionService::new(Arc::new(engine), templater, render.timeouts())
        .with_limiter_opt(render.max_concurrent_sessions.map(RenderLimiter::new))
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let body_limit = usize::try_from(settings.server.max_request_bytes.get()).map_err(|_| {
        AppError::from(InfraError::configuration(
            "server.max_request_bytes exceeds the address space",
        ))
    })?;

    let conversions = Arc::new(build_conversion_service(&settings.render));
    let router = http::build_router(HttpState { conversions }, body_limit);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "markpress::serve",
        addr = %settings.server.addr,
        max_request_bytes = body_limit,
        max_concurrent_sessions = settings.render.max_concurrent_sessions.map(|n| n.get()),
        remote_fonts = settings.render.font_stylesheet_url.is_some(),
        "Listening for conversion requests"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "markpress::serve", "Server stopped");
    Ok(())
}

async fn run_convert(settings: Settings, args: ConvertArgs) -> Result<(), AppError> {
    let markdown = read_input(&args).await?;
    let output = args.output_path();
    let filename = output
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(STDIN_OUTPUT_NAME)
        .to_string();

    let service = build_conversion_service(&settings.render);
    let download = service
        .convert(ConversionDraft::new(markdown, filename))
        .await?;

    tokio::fs::write(&output, download.artifact.bytes())
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "markpress::convert",
        output = %output.display(),
        pdf_bytes = download.artifact.byte_len(),
        "Wrote PDF"
    );
    Ok(())
}

async fn read_input(args: &ConvertArgs) -> Result<String, AppError> {
    let markdown = if args.reads_stdin() {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .map_err(InfraError::from)?;
        buffer
    } else {
        tokio::fs::read_to_string(&args.input)
            .await
            .map_err(InfraError::from)?
    };
    Ok(markdown)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "markpress::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "markpress::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "markpress::serve", "Shutdown signal received; draining requests");
}
