//! Loads the [`Config`] for a run. Configuration lives in an optional
//! `keyweave.yaml` project file which is searched for in the project directory
//! and its ancestors. Every field is optional; without a project file the
//! defaults apply relative to the project directory.
//!
//! ```yaml
//! posts_directory: posts
//! index_file: keyword-index.json
//! frequency_file: keyword-frequency.json
//! widget_file: keyword-navigation.js
//! title_suffix: " | My Blog"
//! log_level: info
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Level;

/// The name of the project file.
pub const PROJECT_FILE: &str = "keyweave.yaml";

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct Project {
    posts_directory: Option<PathBuf>,
    index_file: Option<PathBuf>,
    frequency_file: Option<PathBuf>,
    widget_file: Option<PathBuf>,
    index_url: Option<String>,
    frequency_url: Option<String>,
    script_url: Option<String>,
    posts_url: Option<String>,
    title_suffix: Option<String>,
    log_level: Option<String>,
}

/// The resolved configuration for a run. Paths are absolute or relative to
/// the working directory; URLs are the site-relative locations the browser
/// widget uses.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The directory holding the post HTML files.
    pub posts_directory: PathBuf,

    /// Where the inverted-index artifact is written.
    pub index_file: PathBuf,

    /// Where the frequency-table artifact is written.
    pub frequency_file: PathBuf,

    /// Where the navigation widget script is written.
    pub widget_file: PathBuf,

    /// The URL the widget fetches the inverted index from.
    pub index_url: String,

    /// The URL the widget fetches the frequency table from.
    pub frequency_url: String,

    /// The URL posts load the widget script from.
    pub script_url: String,

    /// The URL prefix of post pages; related-post links are
    /// `{posts_url}{slug}.html`.
    pub posts_url: String,

    /// Removed from the end of post titles.
    pub title_suffix: Option<String>,

    pub log_level: Level,
}

impl Config {
    /// Finds the project file in `dir` or one of its ancestors and loads it.
    /// If there is none, returns the defaults rooted at `dir`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        match dir
            .ancestors()
            .map(|ancestor| ancestor.join(PROJECT_FILE))
            .find(|path| path.is_file())
        {
            Some(path) => Config::from_project_file(&path),
            None => Config::resolve(dir, Project::default()),
        }
    }

    /// Loads the project file at `path`. Relative paths in the file resolve
    /// against the file's directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        let project: Project = serde_yaml::from_reader(file).map_err(|err| Error::Parse {
            path: path.to_owned(),
            err,
        })?;
        let root = match path.parent() {
            Some(parent) => parent,
            None => Path::new("."),
        };
        Config::resolve(root, project)
    }

    fn resolve(root: &Path, project: Project) -> Result<Config> {
        let path = |value: Option<PathBuf>, default: &str| {
            root.join(value.unwrap_or_else(|| PathBuf::from(default)))
        };
        let url = |value: Option<String>, default: &str| value.unwrap_or_else(|| default.to_owned());

        Ok(Config {
            posts_directory: path(project.posts_directory, "posts"),
            index_file: path(project.index_file, "keyword-index.json"),
            frequency_file: path(project.frequency_file, "keyword-frequency.json"),
            widget_file: path(project.widget_file, "keyword-navigation.js"),
            index_url: url(project.index_url, "/keyword-index.json"),
            frequency_url: url(project.frequency_url, "/keyword-frequency.json"),
            script_url: url(project.script_url, "/keyword-navigation.js"),
            posts_url: url(project.posts_url, "/posts/"),
            title_suffix: project.title_suffix,
            log_level: match project.log_level {
                None => Level::INFO,
                Some(level) => level
                    .parse()
                    .map_err(|_| Error::InvalidLogLevel(level.clone()))?,
            },
        })
    }
}

/// The result of loading a [`Config`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when the project file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when the project file isn't valid YAML or has unknown fields.
    Parse {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when `log_level` isn't one of `trace`, `debug`, `info`,
    /// `warn`, or `error`.
    InvalidLogLevel(String),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "Opening project file `{}`: {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Loading project file `{}`: {}", path.display(), err)
            }
            Error::InvalidLogLevel(level) => {
                write!(f, "Invalid log level `{}`", level)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
            Error::InvalidLogLevel(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_project_file() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_directory(dir.path())?;
        assert_eq!(dir.path().join("posts"), config.posts_directory);
        assert_eq!(dir.path().join("keyword-index.json"), config.index_file);
        assert_eq!(dir.path().join("keyword-frequency.json"), config.frequency_file);
        assert_eq!("/posts/", config.posts_url);
        assert_eq!(None, config.title_suffix);
        assert_eq!(Level::INFO, config.log_level);
        Ok(())
    }

    #[test]
    fn test_project_file_found_in_ancestor() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_FILE),
            "posts_directory: site/posts\ntitle_suffix: \" | Blog\"\nlog_level: debug\n",
        )
        .unwrap();
        let nested = dir.path().join("site").join("posts");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::from_directory(&nested)?;
        assert_eq!(dir.path().join("site/posts"), config.posts_directory);
        assert_eq!(dir.path().join("keyword-index.json"), config.index_file);
        assert_eq!(Some(String::from(" | Blog")), config.title_suffix);
        assert_eq!(Level::DEBUG, config.log_level);
        Ok(())
    }

    #[test]
    fn test_invalid_project_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);

        fs::write(&path, "post_directory: typo\n").unwrap();
        match Config::from_project_file(&path) {
            Err(Error::Parse { .. }) => {}
            other => panic!("expected a parse error, got {:?}", other),
        }

        fs::write(&path, "log_level: loud\n").unwrap();
        match Config::from_project_file(&path) {
            Err(Error::InvalidLogLevel(level)) => assert_eq!("loud", level),
            other => panic!("expected an invalid log level, got {:?}", other),
        }
    }
}
