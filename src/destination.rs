//! Backup destinations and the compressions they require.
//!
//! Destinations come in four classes: local directories, remote (rsync/ssh)
//! targets, direct streams and pipes to another program. Each one wants its
//! data in a given [`CompressFormat`]. On the command line a destination is
//! written `FORMAT=TARGET`, e.g. `--dst-local gzip=/mnt/backups`; without a
//! known format prefix the data is sent uncompressed.

use crate::error::{Error, Result};
use crate::options::ParsedOptions;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Supported compression formats for destinations.
#[derive(
    ValueEnum,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum CompressFormat {
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    Lz4,
    Zip,
    Sevenz,
    Tar,
}

impl CompressFormat {
    pub fn name(&self) -> &'static str {
        match self {
            CompressFormat::None => "none",
            CompressFormat::Gzip => "gzip",
            CompressFormat::Bzip2 => "bzip2",
            CompressFormat::Xz => "xz",
            CompressFormat::Zstd => "zstd",
            CompressFormat::Lz4 => "lz4",
            CompressFormat::Zip => "zip",
            CompressFormat::Sevenz => "sevenz",
            CompressFormat::Tar => "tar",
        }
    }
}

impl fmt::Display for CompressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single backup target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    #[serde(default)]
    pub compression: CompressFormat,
    pub target: String,
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (compression, target) = match s.split_once('=') {
            Some((prefix, target)) => match <CompressFormat as ValueEnum>::from_str(prefix, true) {
                Ok(format) => (format, target),
                Err(_) => (CompressFormat::None, s),
            },
            None => (CompressFormat::None, s),
        };
        if target.is_empty() {
            return Err(Error::InvalidDestination(s.to_string()));
        }
        Ok(Destination {
            compression,
            target: target.to_string(),
        })
    }
}

/// Transport class of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationClass {
    Local,
    Remote,
    Direct,
    Pipe,
}

impl DestinationClass {
    pub const ALL: [DestinationClass; 4] = [
        DestinationClass::Local,
        DestinationClass::Remote,
        DestinationClass::Direct,
        DestinationClass::Pipe,
    ];

    /// Repeated option listing destinations of this class.
    pub fn option_key(&self) -> &'static str {
        match self {
            DestinationClass::Local => "dst-local",
            DestinationClass::Remote => "dst-remote",
            DestinationClass::Direct => "dst-direct",
            DestinationClass::Pipe => "dst-pipe",
        }
    }
}

/// All destinations of a run, by class.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationSet {
    pub local: Vec<Destination>,
    pub remote: Vec<Destination>,
    pub direct: Vec<Destination>,
    pub pipe: Vec<Destination>,
}

impl DestinationSet {
    /// Reads the `dst-local`, `dst-remote`, `dst-direct` and `dst-pipe`
    /// options.
    ///
    /// # Errors
    /// [`Error::InvalidDestination`] for an empty target.
    pub fn from_options(options: &ParsedOptions) -> Result<Self> {
        let mut set = DestinationSet::default();
        for class in DestinationClass::ALL {
            let parsed = options
                .list(class.option_key())
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<Destination>>>()?;
            set.class_mut(class).extend(parsed);
        }
        Ok(set)
    }

    /// Loads destinations from a TOML file:
    ///
    /// ```toml
    /// [[local]]
    /// compression = "gzip"
    /// target = "/mnt/backups"
    ///
    /// [[pipe]]
    /// target = "/usr/local/bin/upload"
    /// ```
    ///
    /// # Errors
    /// [`Error::DestinationFile`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let file_error = |reason: String| Error::DestinationFile {
            path: path.to_path_buf(),
            reason,
        };
        let toml_str = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        toml::from_str(&toml_str).map_err(|e| file_error(e.to_string()))
    }

    /// Appends every destination of `other`.
    pub fn merge(&mut self, other: DestinationSet) {
        self.local.extend(other.local);
        self.remote.extend(other.remote);
        self.direct.extend(other.direct);
        self.pipe.extend(other.pipe);
    }

    pub fn class(&self, class: DestinationClass) -> &[Destination] {
        match class {
            DestinationClass::Local => &self.local,
            DestinationClass::Remote => &self.remote,
            DestinationClass::Direct => &self.direct,
            DestinationClass::Pipe => &self.pipe,
        }
    }

    fn class_mut(&mut self, class: DestinationClass) -> &mut Vec<Destination> {
        match class {
            DestinationClass::Local => &mut self.local,
            DestinationClass::Remote => &mut self.remote,
            DestinationClass::Direct => &mut self.direct,
            DestinationClass::Pipe => &mut self.pipe,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DestinationClass, &Destination)> {
        DestinationClass::ALL
            .into_iter()
            .flat_map(move |class| self.class(class).iter().map(move |dst| (class, dst)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Distinct compression formats needed to serve every destination, so each
    /// format is produced once however many destinations share it.
    ///
    /// # Errors
    /// [`Error::NoDestinations`] if the set is empty.
    pub fn required_compressions(&self) -> Result<BTreeSet<CompressFormat>> {
        if self.is_empty() {
            return Err(Error::NoDestinations);
        }
        Ok(self.iter().map(|(_, dst)| dst.compression).collect())
    }
}
