//! Builder for [`RollingFileSink`].

use std::{path::PathBuf, sync::Arc};

use super::{SinkBuildError, SinkBuilderTrait, option_setter};
use crate::{
    rotating::{RollingFileConfig, RollingFileSink},
    sink::TetherSinkTrait,
};

/// Builder for constructing [`RollingFileSink`] instances.
#[derive(Clone, Debug, Default)]
pub struct RollingFileSinkBuilder {
    filename: Option<PathBuf>,
    max_size_mb: Option<u64>,
    max_backups: Option<usize>,
    max_age_days: Option<u64>,
    compress: Option<bool>,
}

impl RollingFileSinkBuilder {
    /// Builder targeting `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    option_setter!(
        #[doc = "Rotate once the file would exceed this many mebibytes. `0` disables rotation."]
        with_max_size_mb,
        max_size_mb,
        u64
    );
    option_setter!(with_max_backups, max_backups, usize);
    option_setter!(
        #[doc = "Delete backups older than this many days. `0` keeps them."]
        with_max_age_days,
        max_age_days,
        u64
    );
    option_setter!(with_compress, compress, bool);

    pub fn build_config(&self) -> Result<RollingFileConfig, SinkBuildError> {
        let mut config = RollingFileConfig::default();
        if let Some(path) = &self.filename {
            if path.as_os_str().is_empty() {
                return Err(SinkBuildError::InvalidConfig(
                    "filename must not be empty".into(),
                ));
            }
            config.filename.clone_from(path);
        }
        if let Some(size) = self.max_size_mb {
            config.max_size_mb = size;
        }
        if let Some(backups) = self.max_backups {
            config.max_backups = backups;
        }
        if let Some(days) = self.max_age_days {
            config.max_age_days = days;
        }
        if let Some(compress) = self.compress {
            config.compress = compress;
        }
        Ok(config)
    }

    pub fn build(&self) -> Result<RollingFileSink, SinkBuildError> {
        Ok(RollingFileSink::open(self.build_config()?)?)
    }
}

impl SinkBuilderTrait for RollingFileSinkBuilder {
    fn build_sink(&self) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError> {
        Ok(Arc::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn builds_with_overrides() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("svc.log");
        let sink = RollingFileSinkBuilder::new(&path)
            .with_max_size_mb(1)
            .with_max_backups(7)
            .with_max_age_days(0)
            .with_compress(false)
            .build()
            .expect("sink");
        assert_eq!(sink.path(), path.as_path());
        assert_eq!(sink.limits().max_backups, 7);
        assert_eq!(sink.limits().max_bytes, 1024 * 1024);
        assert!(sink.limits().max_age.is_none());
        assert!(path.exists());
    }

    #[rstest]
    fn empty_filename_is_rejected() {
        let err = RollingFileSinkBuilder::new("")
            .build_config()
            .expect_err("empty path");
        assert!(matches!(err, SinkBuildError::InvalidConfig(_)));
    }

    #[rstest]
    fn missing_directory_surfaces_io_error() {
        let dir = tempdir().expect("tempdir");
        let err = RollingFileSinkBuilder::new(dir.path().join("missing/app.log"))
            .build()
            .expect_err("parent directory does not exist");
        assert!(matches!(err, SinkBuildError::Io(_)));
    }
}
