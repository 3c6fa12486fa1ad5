use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub auth_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(auth_secret: SecretString) -> Self {
        Self { auth_secret }
    }
}
