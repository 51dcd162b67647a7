use secrecy::SecretString;

/// Credentials the gateway needs to act on behalf of a connected merchant.
#[derive(Debug, Clone)]
pub struct MerchantCredentials {
    pub merchant_id: String,
    pub access_token: SecretString,
}
