use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use collab_core::settings::DaSettings;
use collab_core::BridgeError;

#[derive(Clone, Debug)]
pub struct Config {
    pub listen: SocketAddr,

    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,

    /// Working bucket for job inputs.
    pub bucket_key: String,

    pub aps_base_url: String,
    pub da_base_url: String,
    pub profile_url: String,

    /// Holds the input drawing and the app bundle package.
    pub app_data_dir: PathBuf,

    pub da: DaSettings,

    /// Delay between two work item status polls.
    pub poll_interval: Duration,

    /// Log level (env-filter syntax).
    pub log: String,
}

impl Config {
    pub fn from_args() -> Self {
        use clap::Parser;

        #[derive(Parser, Debug)]
        #[command(name = "collab-daemon", version, about = "Collaboration work-item bridge")]
        struct Args {
            /// Listen address, e.g. 127.0.0.1:8080
            #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8080")]
            listen: SocketAddr,

            #[arg(long, env = "APS_CLIENT_ID")]
            client_id: String,

            #[arg(long, env = "APS_CLIENT_SECRET", hide_env_values = true)]
            client_secret: String,

            /// OAuth redirect, e.g. http://localhost:8080/api/auth/callback
            #[arg(long, env = "APS_CALLBACK_URL")]
            callback_url: String,

            /// Working bucket. A transient one is named when omitted.
            #[arg(long, env = "APS_BUCKET_KEY")]
            bucket_key: Option<String>,

            #[arg(long, default_value = "https://developer.api.autodesk.com")]
            aps_base_url: String,

            #[arg(long, default_value = "https://developer.api.autodesk.com/da/us-east/v3")]
            da_base_url: String,

            #[arg(long, default_value = "https://api.userprofile.autodesk.com/userinfo")]
            profile_url: String,

            #[arg(long, default_value = "App_Data")]
            app_data_dir: PathBuf,

            /// Job service owner nickname.
            #[arg(long, default_value = "adnworks")]
            nickname: String,

            #[arg(long, default_value_t = 2_000)]
            poll_interval_ms: u64,

            #[arg(long, default_value = "info")]
            log: String,
        }

        let a = Args::parse();
        Self {
            listen: a.listen,
            client_id: a.client_id,
            client_secret: a.client_secret,
            callback_url: a.callback_url,
            bucket_key: resolve_bucket_key(a.bucket_key, collab_core::now_ms()),
            aps_base_url: a.aps_base_url,
            da_base_url: a.da_base_url,
            profile_url: a.profile_url,
            app_data_dir: a.app_data_dir,
            da: DaSettings::default().with_owner(a.nickname),
            poll_interval: Duration::from_millis(a.poll_interval_ms),
            log: a.log,
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        for (name, value) in [
            ("APS_CLIENT_ID", &self.client_id),
            ("APS_CLIENT_SECRET", &self.client_secret),
            ("APS_CALLBACK_URL", &self.callback_url),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::setup(format!("missing required setting {name}")));
            }
        }
        Ok(())
    }

    pub fn input_drawing_path(&self) -> PathBuf {
        self.app_data_dir.join(collab_core::settings::INPUT_DRAWING)
    }

    pub fn package_path(&self) -> PathBuf {
        self.app_data_dir.join(&self.da.package_name)
    }
}

/// Uses the configured bucket, or a transient `adn-clb-<unix secs>` one.
pub fn resolve_bucket_key(configured: Option<String>, now_ms: i64) -> String {
    match configured {
        Some(b) if !b.trim().is_empty() => b,
        _ => format!("adn-clb-{}", now_ms / 1000),
    }
}

#[cfg(test)]
impl Config {
    /// Every remote service at `base`.
    pub(crate) fn for_tests(base: &str) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            callback_url: "http://localhost:8080/api/auth/callback".into(),
            bucket_key: "bucket".into(),
            aps_base_url: base.into(),
            da_base_url: base.into(),
            profile_url: format!("{base}/userinfo"),
            app_data_dir: "App_Data".into(),
            da: DaSettings::default(),
            poll_interval: Duration::from_millis(1),
            log: "info".into(),
        }
    }
}
