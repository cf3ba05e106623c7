//! Translation workbench reference server
//! Serves documents, versions and the lease protocol from memory

mod api;

use collaboration::InMemoryStore;
use document::{Document, VersionType};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("workbench_server=debug,collaboration=info,tower_http=info")
            }),
        )
        .init();

    info!("Starting translation workbench server...");

    let store = Arc::new(InMemoryStore::new());
    seed_store(&store);

    let app = api::router(store)
        .layer(TraceLayer::new_for_http())
        // CORS for local development
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = std::env::var("WORKBENCH_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    info!("Workbench server listening on http://{}", addr);
    info!("API endpoints:");
    info!("  GET  /api/documents/:id                   - Document with latest handover");
    info!("  GET  /api/documents/:id/versions          - All versions");
    info!("  POST /api/documents/:id/versions          - Add a version");
    info!("  POST /api/translation-work/:id/lock       - Acquire the edit lease");
    info!("  GET  /api/translation-work/:id/lock/status - Lease holder");
    info!("  POST /api/translation-work/:id/save       - Save work");
    info!("  POST /api/translation-work/:id/handover   - Hand over and release");
    info!("  POST /api/translation-work/:id/complete   - Complete and release");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Demo documents so a fresh server has something to translate.
fn seed_store(store: &InMemoryStore) {
    let documents = [
        (
            "welcome",
            "Welcome Guide",
            "<html><head><style>body { font-family: serif }</style></head><body>\
             <h1>Welcome</h1><p>This guide explains the basics.</p>\
             <p>Each paragraph is translated on its own.</p>\
             <ul><li>Hover to compare panes</li><li>Mark paragraphs done</li></ul>\
             </body></html>",
            Some(
                "<h1>Bienvenida</h1><p>Esta guía explica lo básico.</p>\
                 <p>Cada párrafo se traduce por separado.</p>\
                 <ul><li>Pasa el cursor para comparar</li><li>Marca los párrafos listos</li></ul>",
            ),
        ),
        (
            "release-notes",
            "Release Notes",
            "<h2>Changes</h2><p>Faster loading.</p><p>Fixed scrolling between panes.</p>",
            None,
        ),
    ];

    for (id, title, original, draft) in documents {
        let id = store.insert_document(Document::new(title).with_id(id));
        store.add_version(&id, VersionType::Original, original);
        if let Some(draft) = draft {
            store.add_version(&id, VersionType::AiDraft, draft);
        }
    }
    info!("Seeded {} documents", store.document_ids().len());
}
