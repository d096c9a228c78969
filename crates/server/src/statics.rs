//! Static route data, either loaded once from disk or fetched per route from a remote
//! copy of the pipeline output.

use std::sync::Arc;

use futures_util::future::join_all;
use reqwest::Client;
use snapline::{
    config::SwapConfig,
    repository::Repository,
    source::{self, RawFeatureCollection, RawRouteMap, Source},
};
use tracing::{info, warn};

use crate::{
    cache::AsyncCache,
    fetch::{FetchError, RetryPolicy, fetch_json},
    settings::Settings,
};

const ROUTE_MAP_KEY: &str = "routeMap.json";

pub enum StaticData {
    Local(Arc<Repository>),
    Remote(RemoteStatic),
}

pub struct RemoteStatic {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    swap: SwapConfig,
    route_maps: AsyncCache<String, Arc<RawRouteMap>, FetchError>,
    geometries: AsyncCache<String, RawFeatureCollection, FetchError>,
}

impl StaticData {
    /// A local data path wins over a remote base URL.
    pub async fn load(settings: &Settings, client: Client) -> Result<Self, source::Error> {
        if let Some(path) = settings.static_path.clone() {
            let swap = settings.engine.swap.clone();
            let repository = tokio::task::spawn_blocking(move || {
                let source = if path.is_dir() {
                    Source::default().from_directory(path)
                } else {
                    Source::default().from_zip(path)
                };
                Repository::new().with_source(&source, &swap)
            })
            .await
            .map_err(|err| source::Error::Io(std::io::Error::other(err)))??;
            info!(
                "Loaded {} route variants from disk",
                repository.variants.len()
            );
            return Ok(Self::Local(Arc::new(repository)));
        }

        let base_url = settings
            .static_base_url
            .clone()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        Ok(Self::Remote(RemoteStatic {
            client,
            base_url,
            policy: settings.retry.clone(),
            swap: settings.engine.swap.clone(),
            route_maps: AsyncCache::new(1),
            geometries: AsyncCache::new(settings.cache_capacity),
        }))
    }

    /// Data covering `route_name`. Remote data only carries the geometries of that route.
    pub async fn repository_for(&self, route_name: &str) -> Result<Arc<Repository>, FetchError> {
        match self {
            Self::Local(repository) => Ok(repository.clone()),
            Self::Remote(remote) => remote.repository_for(route_name).await,
        }
    }
}

impl RemoteStatic {
    async fn route_map(&self) -> Result<Arc<RawRouteMap>, FetchError> {
        let client = self.client.clone();
        let url = format!("{}/{ROUTE_MAP_KEY}", self.base_url);
        let policy = self.policy.clone();
        self.route_maps
            .get_or_fetch(ROUTE_MAP_KEY.to_string(), move || async move {
                fetch_json::<RawRouteMap>(&client, &url, &[], &policy)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    async fn geometry(&self, variant_id: &str) -> Result<RawFeatureCollection, FetchError> {
        let client = self.client.clone();
        let url = format!("{}/derived_routes/{variant_id}.geojson", self.base_url);
        let policy = self.policy.clone();
        self.geometries
            .get_or_fetch(variant_id.to_string(), move || async move {
                fetch_json::<RawFeatureCollection>(&client, &url, &[], &policy).await
            })
            .await
    }

    async fn repository_for(&self, route_name: &str) -> Result<Arc<Repository>, FetchError> {
        let route_map = self.route_map().await?;
        let variant_ids: Vec<String> = route_map
            .route_numbers
            .get(route_name.trim())
            .cloned()
            .unwrap_or_default();
        // Only the selected route's geometries stay cached
        self.geometries.clear_except(&variant_ids);

        let results = join_all(variant_ids.iter().map(|id| self.geometry(id))).await;
        let geometries: Vec<RawFeatureCollection> = variant_ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(collection) => Some(collection),
                Err(err) => {
                    warn!("No geometry for route variant {id}: {err}");
                    None
                }
            })
            .collect();

        let swap = self.swap.clone();
        let route_map = RawRouteMap::clone(&route_map);
        let repository = tokio::task::spawn_blocking(move || {
            Repository::new().with_data(route_map, geometries, &swap)
        })
        .await
        .map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(Arc::new(repository))
    }
}
