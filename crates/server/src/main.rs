//! Robot Chat Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use robot_chat_agent::{
    ConversationState, EngagementLoop, EngagementTracker, FrameStore, Greeter, MotionReservation,
    SpeechSink, TurnDispatcher, TurnDispatcherConfig,
};
use robot_chat_config::{load_settings, Settings};
use robot_chat_core::ChatModel;
use robot_chat_llm::{OpenAIBackend, OpenAIConfig, PromptBuilder};
use robot_chat_server::{
    create_router, frame_channel, init_metrics, AppState, HttpMotionClient, HttpSpeechClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("ROBOT_CHAT_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);
    settings.validate().context("invalid configuration")?;

    tracing::info!("Starting Robot Chat Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        mode = ?settings.dispatcher.mode,
        chat_model = %settings.llm.chat_model,
        vision_model = %settings.llm.vision_model,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let prompts = PromptBuilder::new(settings.prompts.clone());
    let llm_config = OpenAIConfig::from_settings(&settings.llm)
        .with_motion_instruction(prompts.motion_instruction(&settings.motion.available_motions));
    let model: Arc<dyn ChatModel> =
        Arc::new(OpenAIBackend::new(llm_config).context("model backend")?);

    let speech = SpeechSink::new(Arc::new(HttpSpeechClient::new(&settings.voice)?));
    let motion = Arc::new(MotionReservation::new(Arc::new(HttpMotionClient::new(
        &settings.motion,
    )?)));
    let conversation = Arc::new(ConversationState::new(prompts.system()));
    let frames = Arc::new(FrameStore::new());

    let dispatcher = Arc::new(TurnDispatcher::new(
        TurnDispatcherConfig::from_settings(&settings),
        model.clone(),
        speech.clone(),
        motion,
        conversation.clone(),
        frames.clone(),
    ));

    let shutdown = CancellationToken::new();
    let (frame_tx, source) = frame_channel(settings.engagement.frame_queue);
    let mut engagement = EngagementLoop::new(
        EngagementTracker::from_config(&settings.engagement),
        frames,
        shutdown.clone(),
    );
    if settings.engagement.greeting_enabled {
        let greeter = Greeter::new(
            model,
            speech,
            conversation,
            prompts,
            settings.llm.vision_model.clone(),
        );
        engagement = engagement.with_greeter(Arc::new(greeter));
    }
    let status = engagement.subscribe();
    let engagement_task = tokio::spawn(engagement.run(source));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("server address")?;
    let state = AppState::new(Arc::new(settings), dispatcher, frame_tx, status);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = engagement_task.await {
        tracing::warn!(error = %e, "Engagement loop ended abnormally");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("robot_chat={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
