use clap::Parser;
use facesecure_core::liveness::LivenessPolicy;

#[derive(Debug, Clone, Parser)]
#[command(name = "facesecure")]
#[command(about = "FaceSecure Verification API Server", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the verification server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./facesecure.db?mode=rwc"
        )]
        database_url: String,
    },

    /// Create a new account (password only; face enrollment goes through the API)
    CreateUser {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// List all accounts
    ListUsers,
}

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./facesecure.db?mode=rwc"
    )]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Allowed CORS origins (comma-separated)
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000,http://localhost:5173"
    )]
    pub cors_origins: String,

    /// Base URL used to build shareable verification URLs
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Recognition provider base URL (embedding generation/comparison)
    #[arg(long, env = "ML_SERVICE_URL", default_value = "http://localhost:8000")]
    pub ml_service_url: String,

    /// Secret the face-template encryption key is derived from
    #[arg(long, env = "ENCRYPTION_KEY", default_value = "dev-insecure-key")]
    pub encryption_key: String,

    /// Session token expiration time in seconds
    #[arg(long, env = "JWT_EXPIRATION", default_value = "86400")]
    pub jwt_expiration: i64,

    /// JWT Key ID (kid) used in token headers and the JWKS document
    #[arg(long, env = "JWT_KID", default_value = "facesecure-key-1")]
    pub jwt_kid: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Minimum liveness motion score
    #[arg(long, env = "MIN_MOTION_SCORE", default_value = "0.7")]
    pub min_motion_score: f64,

    /// Minimum liveness texture score
    #[arg(long, env = "MIN_TEXTURE_SCORE", default_value = "0.8")]
    pub min_texture_score: f64,

    /// Minimum capture/provider quality score
    #[arg(long, env = "MIN_QUALITY_SCORE", default_value = "0.75")]
    pub min_quality_score: f64,

    /// Similarity at or above which a face login is accepted outright
    #[arg(long, env = "FACE_MATCH_THRESHOLD", default_value = "0.85")]
    pub face_match_threshold: f64,

    /// Similarity at or above which a face login may proceed with step-up MFA
    #[arg(long, env = "FACE_MATCH_MFA_THRESHOLD", default_value = "0.70")]
    pub face_match_mfa_threshold: f64,

    /// Maximum age of a capture timestamp in seconds
    #[arg(long, env = "MAX_CAPTURE_AGE_SECS", default_value = "30")]
    pub max_capture_age_secs: i64,
}

impl ServeConfig {
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }

    /// Collect the threshold flags into the immutable policy value handed to
    /// the decision pipeline.
    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            liveness: LivenessPolicy {
                min_motion_score: self.min_motion_score,
                min_texture_score: self.min_texture_score,
                min_quality_score: self.min_quality_score,
            },
            min_provider_quality: self.min_quality_score,
            mfa_threshold: self.face_match_mfa_threshold,
            accept_threshold: self.face_match_threshold,
            max_capture_age_secs: self.max_capture_age_secs,
        }
    }
}

/// All thresholds the decision pipeline consults, resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    pub liveness: LivenessPolicy,
    pub min_provider_quality: f64,
    pub mfa_threshold: f64,
    pub accept_threshold: f64,
    pub max_capture_age_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cors_origin_parsing() {
        let config = ServeConfig::parse_from([
            "serve",
            "--cors-origins",
            "http://localhost:3000, http://example.com",
        ]);

        let origins = config.cors_origin_list();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://localhost:3000");
        assert_eq!(origins[1], "http://example.com");
    }

    #[test]
    fn decision_policy_carries_threshold_flags() {
        let config = ServeConfig::parse_from([
            "serve",
            "--min-motion-score",
            "0.5",
            "--face-match-threshold",
            "0.9",
        ]);

        let policy = config.decision_policy();
        assert_eq!(policy.liveness.min_motion_score, 0.5);
        assert_eq!(policy.accept_threshold, 0.9);
        assert_eq!(policy.mfa_threshold, 0.70);
        assert_eq!(policy.max_capture_age_secs, 30);
    }
}
