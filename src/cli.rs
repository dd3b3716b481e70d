use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipserve")]
#[command(version)]
#[command(about = "Serve static content straight out of a ZIP archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipserve site.zip                        serve site.zip on 127.0.0.1:8080\n  \
  zipserve https://example.com/site.zip    serve a remote archive via Range requests\n  \
  zipserve --hot-mount --api-path api/     start empty; POST {\"filePath\": ...} to /api/mountZIP")]
pub struct Args {
    /// ZIP file path or HTTP URL to mount at startup
    #[arg(value_name = "ARCHIVE", env = "ZIPSERVE_ARCHIVE")]
    pub archive: Option<String>,

    /// Listening host
    #[arg(long, env = "ZIPSERVE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "ZIPSERVE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// URL prefix stripped from request paths
    #[arg(long, env = "ZIPSERVE_URL_PREFIX", default_value = "")]
    pub url_prefix: String,

    /// Base path of the control endpoints (hot mount)
    #[arg(long, env = "ZIPSERVE_API_PATH", default_value = "")]
    pub api_path: String,

    /// Extensions tried for extension-less paths, in order
    #[arg(
        long,
        env = "ZIPSERVE_EXTENSIONS",
        value_delimiter = ',',
        default_value = "html,htm"
    )]
    pub extensions: Vec<String>,

    /// Disable index and trailing-slash redirects
    #[arg(long, env = "ZIPSERVE_NO_REDIRECT")]
    pub no_redirect: bool,

    /// Enable the archive replacement endpoint
    #[arg(long, env = "ZIPSERVE_HOT_MOUNT")]
    pub hot_mount: bool,
}

impl Args {
    /// An archive is required unless it can be mounted later.
    pub fn validate(&self) -> Result<(), String> {
        if self.archive.is_none() && !self.hot_mount {
            return Err("an ARCHIVE is required unless --hot-mount is enabled".to_string());
        }
        Ok(())
    }
}
