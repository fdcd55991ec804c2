#[allow(dead_code)]
pub fn edgar() -> edgar_ingest::Edgar {
    edgar_ingest::Edgar::new("test_agent example@example.com").unwrap()
}
