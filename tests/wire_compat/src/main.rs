fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chunkyard_protocol::{FileError, UploadResponse, UploadedFile};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_progress_response() {
        let parsed = roundtrip_test::<UploadResponse>("progress_response.json");
        assert_eq!(parsed, UploadResponse::progress(524_288));
        assert!(!parsed.is_final());
    }

    #[test]
    fn fixture_completed_response() {
        let parsed = roundtrip_test::<UploadResponse>("completed_response.json");
        assert_eq!(
            parsed,
            UploadResponse::completed(UploadedFile::new("report.pdf", 1_048_576))
        );
        assert!(parsed.is_final());
    }

    #[test]
    fn fixture_completed_response_with_extra_fields() {
        let parsed = roundtrip_test::<UploadResponse>("completed_response_extra.json");
        let UploadResponse::Completed { files } = parsed else {
            panic!("expected completed shape");
        };
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "holiday photo.jpg");
        assert_eq!(files[0].size, 20_971_520);
        assert_eq!(
            files[0].extra["url"],
            "/media/holiday photo_3f9a0c1e.jpg"
        );
        assert!(files[0].extra.contains_key("sha256"));
    }

    #[test]
    fn fixture_save_failed_response() {
        let parsed = roundtrip_test::<UploadResponse>("save_failed_response.json");
        assert_eq!(parsed, UploadResponse::save_failed("report.pdf"));
        assert!(parsed.is_final());

        let entries = roundtrip_test::<Vec<FileError>>("save_failed_response.json");
        assert_eq!(entries[0].error, "ERROR SAVING FILE");
    }

    #[test]
    fn every_fixture_is_a_known_shape() {
        let entries = fs::read_dir(fixtures_dir()).expect("fixtures directory");
        let mut seen = 0;
        for entry in entries {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|e| e == "json") {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                roundtrip_test::<UploadResponse>(&name);
                seen += 1;
            }
        }
        assert_eq!(seen, 4);
    }
}
