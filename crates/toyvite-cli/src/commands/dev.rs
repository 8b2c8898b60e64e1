//! `toyvite dev` command implementation.
//!
//! Unbundled development server. Every request is answered on demand by
//! [`DevServer::respond`]:
//!
//! ```text
//! Browser requests GET /App.vue
//!   → classify (entry / script / library / component / static)
//!   → load from the source or modules directory
//!   → split the component, compile its template, rewrite imports
//!   → serve as application/javascript
//! ```
//!
//! Nothing is cached between requests; editing a file and reloading the page
//! is enough to see the change.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use miette::{IntoDiagnostic, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use toyvite_core::config::{load_config, ConfigFile, DEFAULT_HOST, DEFAULT_PORT};
use toyvite_core::paths::project_root;
use toyvite_core::{DevServer, DevServerConfig};

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Entry HTML document, overriding the config file.
    pub entry: Option<PathBuf>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Explicit config file path.
    pub config: Option<PathBuf>,
}

/// Settings after merging CLI flags with the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Effective {
    port: u16,
    host: String,
    file: ConfigFile,
}

/// CLI flags win when they differ from their defaults; otherwise the config
/// file value is used if present.
fn merge(action: &DevAction, file: Option<ConfigFile>) -> Effective {
    let mut file = file.unwrap_or_default();

    let port = if action.port == DEFAULT_PORT {
        file.server.port.unwrap_or(action.port)
    } else {
        action.port
    };

    let host = if action.host == DEFAULT_HOST {
        file.server
            .host
            .clone()
            .unwrap_or_else(|| action.host.clone())
    } else {
        action.host.clone()
    };

    if let Some(entry) = &action.entry {
        file.entry = Some(entry.clone());
    }

    Effective { port, host, file }
}

fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let host_ip = if host == "localhost" { "127.0.0.1" } else { host };
    format!("{}:{}", host_ip, port).parse().into_diagnostic()
}

/// Run the dev server.
pub async fn run(action: DevAction) -> Result<()> {
    let cwd = dunce::canonicalize(&action.cwd).into_diagnostic()?;
    let root = project_root(&cwd).unwrap_or(cwd);

    // Config errors abort startup.
    let file = match load_config(&root, action.config.as_deref()).into_diagnostic()? {
        Some((config_path, config)) => {
            let rel_path = config_path.strip_prefix(&root).unwrap_or(&config_path);
            println!("  Loaded config from {}", rel_path.display());
            Some(config)
        }
        None => None,
    };

    let effective = merge(&action, file);
    let config = DevServerConfig::from_file(root, &effective.file);

    if !config.entry.is_file() {
        tracing::warn!(entry = %config.entry.display(), "entry document does not exist yet");
    }

    let entry_display = display_relative(&config.entry, &config.root);
    let server = Arc::new(DevServer::new(config));
    let app = router(server);

    let addr = bind_addr(&effective.host, effective.port)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;

    println!();
    println!(
        "  Dev server running at http://{}:{}",
        effective.host, effective.port
    );
    println!("  Serving {}", entry_display);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("dev server stopped");
    Ok(())
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Build the HTTP router. Every path goes through the dispatcher.
pub fn router(server: Arc<DevServer>) -> Router {
    Router::new()
        .route("/", get(serve_request))
        .route("/*path", get(serve_request))
        .with_state(server)
}

/// Serve one request through the dispatcher.
async fn serve_request(State(server): State<Arc<DevServer>>, uri: Uri) -> Response {
    let started = Instant::now();
    let raw_url = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());

    let response = server.respond(raw_url).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    if response.status < 400 {
        tracing::info!(
            path = raw_url,
            kind = %response.kind,
            status = response.status,
            elapsed_ms,
            "request"
        );
    } else {
        tracing::warn!(
            path = raw_url,
            kind = %response.kind,
            status = response.status,
            elapsed_ms,
            body = %String::from_utf8_lossy(&response.body),
            "request failed"
        );
    }

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [
            (header::CONTENT_TYPE, response.content_type),
            (header::CACHE_CONTROL, response.cache_control),
        ],
        response.body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn action(port: u16, host: &str, entry: Option<&str>) -> DevAction {
        DevAction {
            entry: entry.map(PathBuf::from),
            cwd: PathBuf::from("."),
            port,
            host: host.to_string(),
            config: None,
        }
    }

    fn file_with_server(port: u16, host: &str) -> ConfigFile {
        let mut file = ConfigFile::default();
        file.server.port = Some(port);
        file.server.host = Some(host.to_string());
        file
    }

    #[test]
    fn test_merge_defaults_without_file() {
        let effective = merge(&action(DEFAULT_PORT, DEFAULT_HOST, None), None);
        assert_eq!(effective.port, DEFAULT_PORT);
        assert_eq!(effective.host, DEFAULT_HOST);
        assert_eq!(effective.file, ConfigFile::default());
    }

    #[test]
    fn test_merge_file_fills_defaults() {
        let effective = merge(
            &action(DEFAULT_PORT, DEFAULT_HOST, None),
            Some(file_with_server(4000, "0.0.0.0")),
        );
        assert_eq!(effective.port, 4000);
        assert_eq!(effective.host, "0.0.0.0");
    }

    #[test]
    fn test_merge_cli_wins_when_set() {
        let effective = merge(
            &action(5000, "127.0.0.1", Some("web/index.html")),
            Some(file_with_server(4000, "0.0.0.0")),
        );
        assert_eq!(effective.port, 5000);
        assert_eq!(effective.host, "127.0.0.1");
        assert_eq!(effective.file.entry, Some(PathBuf::from("web/index.html")));
    }

    #[test]
    fn test_bind_addr_maps_localhost() {
        let addr = bind_addr("localhost", 3033).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3033");
        assert!(bind_addr("not a host", 3033).is_err());
    }

    /// Lay out a minimal project and serve it on an ephemeral port.
    async fn spawn_fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("src/index.html"),
            "<!doctype html><div id=\"app\"></div><script type=\"module\" src=\"/main.js\"></script>",
        )
        .unwrap();
        fs::write(
            root.join("src/main.js"),
            "import { createApp } from 'vue'\nimport App from './App.vue'\ncreateApp(App).mount('#app')\n",
        )
        .unwrap();
        fs::write(
            root.join("src/App.vue"),
            "<template><h1>{{ msg }}</h1></template>\n<script>\nexport default { data: () => ({ msg: 'hi' }) }\n</script>\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("node_modules/vue/dist")).unwrap();
        fs::write(
            root.join("node_modules/vue/package.json"),
            r#"{ "name": "vue", "module": "dist/vue.esm.js" }"#,
        )
        .unwrap();
        fs::write(
            root.join("node_modules/vue/dist/vue.esm.js"),
            "export function createApp() {}\n",
        )
        .unwrap();

        let config = DevServerConfig::new(root.to_path_buf(), "src/index.html");
        let app = router(Arc::new(DevServer::new(config)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (dir, format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_serves_entry_with_immutable_cache() {
        let (_dir, base) = spawn_fixture().await;
        let res = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(
            res.headers()["cache-control"],
            "max-age=31536000, immutable"
        );
        assert!(res.text().await.unwrap().contains("id=\"app\""));
    }

    #[tokio::test]
    async fn test_serves_rewritten_script() {
        let (_dir, base) = spawn_fixture().await;
        let res = reqwest::get(format!("{base}/main.js")).await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["cache-control"], "no-cache");
        let body = res.text().await.unwrap();
        assert!(body.contains("'/node_modules/vue'"));
        assert!(body.contains("'./App.vue'"));
    }

    #[tokio::test]
    async fn test_serves_component_and_render_modules() {
        let (_dir, base) = spawn_fixture().await;
        let script = reqwest::get(format!("{base}/App.vue"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(script.contains("from \"/App.vue?type=template\""));
        assert!(script.contains("export default __script"));

        let render = reqwest::get(format!("{base}/App.vue?type=template"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(render.contains("export function render(_ctx, _cache)"));
        assert!(render.contains("_ctx.msg"));
    }

    #[tokio::test]
    async fn test_serves_library() {
        let (_dir, base) = spawn_fixture().await;
        let res = reqwest::get(format!("{base}/node_modules/vue")).await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers()["cache-control"],
            "max-age=31536000, immutable"
        );
        assert!(res.text().await.unwrap().contains("createApp"));
    }

    #[tokio::test]
    async fn test_missing_module_is_404_with_js_body() {
        let (_dir, base) = spawn_fixture().await;
        let res = reqwest::get(format!("{base}/missing.js")).await.unwrap();
        assert_eq!(res.status(), 404);
        assert!(res
            .headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/javascript"));
        assert!(res.text().await.unwrap().starts_with("console.error("));
    }

    #[tokio::test]
    async fn test_unknown_library_is_404() {
        let (_dir, base) = spawn_fixture().await;
        let res = reqwest::get(format!("{base}/node_modules/nope")).await.unwrap();
        assert_eq!(res.status(), 404);
    }
}
