//! Global constants used throughout release-mirror.
//!
//! Default endpoints, object keys, and tuning values live here so the
//! configuration defaults and the tests agree on a single source.

/// Upstream document listing the latest release per channel and build.
pub const DEFAULT_RELEASES_URL: &str = "https://factorio.com/api/latest-releases";

/// Release channel looked up in the upstream document.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Build flavour looked up inside the release channel.
pub const DEFAULT_BUILD: &str = "headless";

/// Artifact download URL; `{version}` is substituted with the upstream version.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://www.factorio.com/get-download/{version}/headless/linux64";

/// Local file name of the downloaded artifact; `{version}` is substituted.
pub const DEFAULT_ARTIFACT_FILE_NAME: &str = "factorio-{version}.tar.xz";

/// Placeholder substituted in URL and file name templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Mirror key holding the version marker.
pub const DEFAULT_MARKER_KEY: &str = "factorio/current-version.txt";

/// Mirror key holding the latest mirrored artifact.
pub const DEFAULT_ARTIFACT_KEY: &str = "factorio/latest.tar.xz";

/// Qiniu management (RS) host for the default zone.
pub const DEFAULT_RS_HOST: &str = "https://rs.qiniu.com";

/// Qiniu form-upload host for the default zone.
pub const DEFAULT_UP_HOST: &str = "https://up.qiniup.com";

/// Scheme used for anonymous reads against the bucket domain.
pub const DEFAULT_PUBLIC_SCHEME: &str = "http";

/// Lifetime of a generated upload token (1 hour).
pub const DEFAULT_UPLOAD_TOKEN_TTL_SECS: u64 = 3600;

/// Surface one progress notification every this many chunks.
pub const DEFAULT_PROGRESS_SAMPLE_RATE: u32 = 100;

/// Chunk size used when streaming a local file to the mirror (64 KiB).
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Qiniu answers `612` when the requested object does not exist.
pub const QINIU_NO_SUCH_ENTRY: u16 = 612;

/// Default configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "release-mirror.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "RELEASE_MIRROR_CONFIG";

/// Environment variable disabling progress bars.
pub const NO_PROGRESS_ENV: &str = "RELEASE_MIRROR_NO_PROGRESS";

/// Credential environment variables, named as the bucket operators export them.
pub const ACCESS_KEY_ENV: &str = "QINIU_ACCESS_KEY";
/// Secret key environment variable.
pub const SECRET_KEY_ENV: &str = "QINIU_SECRET_KEY";
/// Bucket name environment variable.
pub const BUCKET_ENV: &str = "QINIU_BUCKET";
/// Public bucket domain environment variable.
pub const DOMAIN_ENV: &str = "QINIU_DOMAIN";
