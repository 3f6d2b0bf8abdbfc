use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use geosync_service::handlers;
use geosync_service::jobs;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn health(pool: web::Data<sqlx::PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "geosync-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "geosync-service"
        })),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match geosync_service::Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting geosync-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Initialize database connection pool
    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    geosync_service::db::run_migrations(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("migrations failed: {e}")))?;

    tracing::info!("Connected to database, migrations applied");

    // Background sync worker
    let (job_sender, job_receiver) = jobs::create_job_queue(config.sync.job_queue_capacity);
    let worker_handle = jobs::spawn_sync_worker(
        db_pool.clone(),
        Arc::new(config.clone()),
        job_sender.clone(),
        job_receiver,
        4,
    );

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let pool_data = web::Data::new(db_pool.clone());
    let config_data = web::Data::new(config.clone());
    let jobs_data = web::Data::new(job_sender.clone());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(jobs_data.clone())
            .wrap(Cors::default().allow_any_origin().allowed_methods(["GET"]))
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/api/v1/health", web::get().to(health))
            .service(
                web::scope("/api/v1/hooks")
                    .route("/{repo_id}", web::post().to(handlers::repo_hook)),
            )
            .service(
                web::scope("/api/v1/repos")
                    .route("", web::get().to(handlers::repos::user_repos))
                    .route("/refresh", web::post().to(handlers::repos::refresh_repos))
                    .route(
                        "/{repo_id}/sync",
                        web::post().to(handlers::sync::repo_sync_enable),
                    )
                    .route(
                        "/{repo_id}/sync",
                        web::delete().to(handlers::sync::repo_sync_disable),
                    )
                    .route(
                        "/{repo_id}/sync_status",
                        web::get().to(handlers::sync::repo_sync_status),
                    ),
            )
            .service(
                web::scope("/api/v1/feature_sets")
                    .route(
                        "/{feature_set_id}/sync",
                        web::post().to(handlers::sync::feature_set_sync_enable),
                    )
                    .route(
                        "/{feature_set_id}/sync",
                        web::delete().to(handlers::sync::feature_set_sync_disable),
                    )
                    .route(
                        "/{feature_set_id}/sync_status",
                        web::get().to(handlers::sync::feature_set_sync_status),
                    )
                    .route(
                        "/{feature_set_id}",
                        web::get().to(handlers::sync::feature_set_detail),
                    ),
            )
            .service(
                web::resource("/api/v1/{user_name}/{repo_name}/{feature_set_name:.*}")
                    .route(web::get().to(handlers::feature_set_query))
                    .route(web::route().to(handlers::query::method_not_allowed)),
            )
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    server_handle.stop(true).await;
    worker_handle.abort();

    match server_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
    }
}
