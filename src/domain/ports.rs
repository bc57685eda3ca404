// Port for the durable key-value storage behind the credential store.
pub trait CredentialBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str) -> Result<(), String>;
    fn clear(&self) -> Result<(), String>;
}
