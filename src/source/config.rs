use std::path::Path;

pub struct Config {
    pub route_map_file_name: String,
    pub geometry_directory: String,
    pub geometry_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route_map_file_name: "routeMap.json".into(),
            geometry_directory: "derived_routes".into(),
            geometry_extension: "geojson".into(),
        }
    }
}

impl Config {
    pub fn is_geometry_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case(&self.geometry_extension))
    }
}

#[test]
fn geometry_extension_is_case_insensitive() {
    let config = Config::default();
    assert!(config.is_geometry_file(Path::new("derived_routes/R1.geojson")));
    assert!(config.is_geometry_file(Path::new("R1.GEOJSON")));
    assert!(!config.is_geometry_file(Path::new("routeMap.json")));
    assert!(!config.is_geometry_file(Path::new("derived_routes")));
}
