//! Types generated from `fixtures/` at build time.

pub mod storage {
    include!(concat!(env!("OUT_DIR"), "/storage.rs"));
}

pub mod catalog {
    /// Hand-written; the generator is told not to emit it.
    #[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
    pub struct Hash {
        pub alg: String,
        pub hex: String,
    }

    include!(concat!(env!("OUT_DIR"), "/catalog.rs"));
}

/// Deserialize with JSON-path context in error messages.
pub fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, String> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        format!("at JSON path {path} → {}", err.into_inner())
    })
}
