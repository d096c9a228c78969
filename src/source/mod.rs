use serde::de::DeserializeOwned;
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;
use zip::ZipArchive;

mod config;
pub mod models;
pub use config::*;
pub use models::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not find file with name: {0}")]
    FileNotFound(String),
}

#[derive(Default)]
pub enum StorageType {
    /// Nothing loaded yet, every stream is empty.
    #[default]
    None,
    /// An unpacked pipeline output directory.
    Directory(PathBuf),
    /// The same layout packed into a zip archive.
    Zip(PathBuf),
    /// Data that was already fetched and parsed elsewhere.
    Memory {
        route_map: Box<RawRouteMap>,
        geometries: Vec<RawFeatureCollection>,
    },
}

/// Reads the artefacts of the route pipeline: one route map plus one GeoJSON
/// feature collection per route variant.
#[derive(Default)]
pub struct Source {
    config: Config,
    storage: StorageType,
}

impl Source {
    pub fn new(config: self::Config) -> Self {
        Self {
            config,
            storage: Default::default(),
        }
    }

    pub fn from_directory(mut self, path: PathBuf) -> Self {
        self.storage = StorageType::Directory(path);
        self
    }

    pub fn from_zip(mut self, path: PathBuf) -> Self {
        self.storage = StorageType::Zip(path);
        self
    }

    pub fn from_memory(
        mut self,
        route_map: RawRouteMap,
        geometries: Vec<RawFeatureCollection>,
    ) -> Self {
        self.storage = StorageType::Memory {
            route_map: Box::new(route_map),
            geometries,
        };
        self
    }

    pub fn route_map(&self) -> Result<RawRouteMap, self::Error> {
        match &self.storage {
            StorageType::None => Ok(RawRouteMap::default()),
            StorageType::Directory(path) => read_json(&path.join(&self.config.route_map_file_name)),
            StorageType::Zip(path) => {
                let mut archive = ZipArchive::new(File::open(path)?)?;
                let index = archive
                    .index_for_name(&self.config.route_map_file_name)
                    .ok_or(self::Error::FileNotFound(
                        self.config.route_map_file_name.clone(),
                    ))?;
                let file = archive.by_index(index)?;
                Ok(serde_json::from_reader(file)?)
            }
            StorageType::Memory { route_map, .. } => Ok(route_map.as_ref().clone()),
        }
    }

    /// Streams every geometry file. Files that fail to parse are logged and skipped.
    pub fn stream_geometries<F>(&self, mut f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, RawFeatureCollection)),
    {
        match &self.storage {
            StorageType::None => Ok(()),
            StorageType::Directory(path) => {
                let directory = path.join(&self.config.geometry_directory);
                if !directory.exists() {
                    return Err(self::Error::FileNotFound(
                        directory.to_string_lossy().into_owned(),
                    ));
                }
                let mut paths: Vec<PathBuf> = fs::read_dir(&directory)?
                    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                    .filter(|path| self.config.is_geometry_file(path))
                    .collect();
                paths.sort();
                paths
                    .iter()
                    .filter_map(|path| {
                        parse_or_warn(path, read_json::<RawFeatureCollection>(path))
                    })
                    .enumerate()
                    .for_each(&mut f);
                Ok(())
            }
            StorageType::Zip(path) => {
                let mut archive = ZipArchive::new(File::open(path)?)?;
                let mut names: Vec<String> = archive
                    .file_names()
                    .filter(|name| {
                        name.starts_with(&self.config.geometry_directory)
                            && self.config.is_geometry_file(Path::new(name))
                    })
                    .map(str::to_string)
                    .collect();
                names.sort();
                let mut index = 0;
                for name in names {
                    let mut buffer = String::new();
                    archive.by_name(&name)?.read_to_string(&mut buffer)?;
                    let parsed = serde_json::from_str::<RawFeatureCollection>(&buffer);
                    if let Some(collection) = parse_or_warn(Path::new(&name), parsed) {
                        f((index, collection));
                        index += 1;
                    }
                }
                Ok(())
            }
            StorageType::Memory { geometries, .. } => {
                geometries.iter().cloned().enumerate().for_each(f);
                Ok(())
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, self::Error> {
    if !path.exists() {
        return Err(self::Error::FileNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_or_warn<T, E: std::fmt::Display>(path: &Path, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Skipping {}: {err}", path.display());
            None
        }
    }
}
