//! Venue-B write side: wallet-signed CLOB order placement in proxy mode.
//!
//! Orders are EIP-712 signed with the wallet key and placed on behalf of a
//! proxy maker (funder) address. Authenticated REST calls use L2 HMAC-SHA256
//! headers; the L2 credentials can be derived deterministically from the
//! wallet key at a fixed nonce when not supplied.

use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE as BASE64_URL_SAFE};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use tracing::info;

use crate::config::{BALANCE_TIMEOUT, CLOB_API_URL, FILL_TIMEOUT, ORDER_TIMEOUT, POLYGON_CHAIN_ID};
use crate::error::{VenueError, VenueResult};

type HmacSha256 = Hmac<Sha256>;

// === EIP-712 constants ===

const DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const DOMAIN_VERSION: &str = "1";
const EXCHANGE_CONTRACT: &str = "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E";
const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

/// Collateral uses 6 decimal places.
const USDC_DECIMALS_SCALE: f64 = 1_000_000.0;

const SIDE_BUY: u8 = 0;
#[allow(dead_code)]
const SIDE_SELL: u8 = 1;

/// Proxy signature scheme: a separate signer key authorizes trades on behalf
/// of the funder address that holds the balance.
const SIGNATURE_TYPE_PROXY: u8 = 2;

/// Nonce used when deriving API credentials from the wallet key.
const DERIVE_NONCE: u64 = 0;

// === Hashing primitives ===

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

fn keccak256_str(s: &str) -> [u8; 32] {
    keccak256(s.as_bytes())
}

fn abi_u256_from_u64(v: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..32].copy_from_slice(&v.to_be_bytes());
    out
}

fn abi_address(addr: &[u8; 20]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..32].copy_from_slice(addr);
    out
}

fn parse_address(addr: &str) -> VenueResult<[u8; 20]> {
    let hex_part = addr.strip_prefix("0x").unwrap_or(addr);
    let bytes = hex::decode(hex_part)
        .map_err(|e| VenueError::Validation(format!("invalid address {addr}: {e}")))?;
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| VenueError::Validation(format!("address {addr} is not 20 bytes")))?;
    Ok(arr)
}

/// Token ids are decimal uint256 strings; encode as big-endian 32 bytes.
fn abi_u256_from_decimal(token_id: &str) -> [u8; 32] {
    let mut acc = [0u8; 32];
    for ch in token_id.bytes() {
        if !ch.is_ascii_digit() {
            continue;
        }
        // acc = acc * 10 + digit
        let mut carry = (ch - b'0') as u16;
        for byte in acc.iter_mut().rev() {
            let v = (*byte as u16) * 10 + carry;
            *byte = (v & 0xFF) as u8;
            carry = v >> 8;
        }
    }
    acc
}

// === Wallet ===

/// secp256k1 wallet: signs EIP-712 hashes and exposes its address.
pub struct Wallet {
    signing_key: SigningKey,
    address: String,
}

impl Wallet {
    pub fn from_private_key(private_key_hex: &str) -> VenueResult<Self> {
        let key_hex = private_key_hex.trim().strip_prefix("0x").unwrap_or(private_key_hex.trim());
        let key_bytes = hex::decode(key_hex)
            .map_err(|e| VenueError::Auth(format!("invalid wallet key hex: {e}")))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| VenueError::Auth(format!("invalid wallet key: {e}")))?;

        // Address = last 20 bytes of keccak(uncompressed pubkey minus prefix)
        let pubkey = signing_key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&pubkey.as_bytes()[1..]);
        let address = format!("0x{}", hex::encode(&hash[12..]));

        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a raw 32-byte hash; returns `0x{r}{s}{v}` with v ∈ {27, 28}.
    fn sign_hash(&self, hash: &[u8; 32]) -> VenueResult<String> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| VenueError::Auth(format!("ECDSA sign failed: {e}")))?;
        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(&signature.r().to_bytes());
        sig.extend_from_slice(&signature.s().to_bytes());
        sig.push(recovery_id.to_byte() + 27);
        Ok(format!("0x{}", hex::encode(sig)))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

// === EIP-712 order ===

/// CLOB order fields as hashed by the exchange contract.
struct Eip712Order<'a> {
    salt: u64,
    maker: [u8; 20],
    signer: [u8; 20],
    token_id: &'a str,
    maker_amount: u64,
    taker_amount: u64,
    side: u8,
    signature_type: u8,
}

fn domain_separator() -> VenueResult<[u8; 32]> {
    let contract = parse_address(EXCHANGE_CONTRACT)?;
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(&keccak256_str(
        "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    ));
    encoded.extend_from_slice(&keccak256_str(DOMAIN_NAME));
    encoded.extend_from_slice(&keccak256_str(DOMAIN_VERSION));
    encoded.extend_from_slice(&abi_u256_from_u64(POLYGON_CHAIN_ID));
    encoded.extend_from_slice(&abi_address(&contract));
    Ok(keccak256(&encoded))
}

fn order_struct_hash(order: &Eip712Order<'_>) -> [u8; 32] {
    let type_hash = keccak256_str(
        "Order(uint256 salt,address maker,address signer,address taker,\
         uint256 tokenId,uint256 makerAmount,uint256 takerAmount,\
         uint256 expiration,uint256 nonce,uint256 feeRateBps,\
         uint8 side,uint8 signatureType)",
    );
    let mut encoded = Vec::with_capacity(13 * 32);
    encoded.extend_from_slice(&type_hash);
    encoded.extend_from_slice(&abi_u256_from_u64(order.salt));
    encoded.extend_from_slice(&abi_address(&order.maker));
    encoded.extend_from_slice(&abi_address(&order.signer));
    encoded.extend_from_slice(&abi_address(&[0u8; 20])); // taker: open order
    encoded.extend_from_slice(&abi_u256_from_decimal(order.token_id));
    encoded.extend_from_slice(&abi_u256_from_u64(order.maker_amount));
    encoded.extend_from_slice(&abi_u256_from_u64(order.taker_amount));
    encoded.extend_from_slice(&abi_u256_from_u64(0)); // expiration: none
    encoded.extend_from_slice(&abi_u256_from_u64(0)); // nonce
    encoded.extend_from_slice(&abi_u256_from_u64(0)); // feeRateBps
    encoded.extend_from_slice(&abi_u256_from_u64(order.side as u64));
    encoded.extend_from_slice(&abi_u256_from_u64(order.signature_type as u64));
    keccak256(&encoded)
}

fn signing_hash(domain: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(66);
    data.push(0x19);
    data.push(0x01);
    data.extend_from_slice(domain);
    data.extend_from_slice(struct_hash);
    keccak256(&data)
}

// === L1 / L2 authentication ===

/// API credentials for L2-authenticated endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

fn clob_auth_signature(wallet: &Wallet, timestamp: &str, nonce: u64) -> VenueResult<String> {
    // ClobAuth domain has no verifyingContract field
    let mut encoded = Vec::with_capacity(4 * 32);
    encoded.extend_from_slice(&keccak256_str(
        "EIP712Domain(string name,string version,uint256 chainId)",
    ));
    encoded.extend_from_slice(&keccak256_str(CLOB_AUTH_DOMAIN_NAME));
    encoded.extend_from_slice(&keccak256_str(DOMAIN_VERSION));
    encoded.extend_from_slice(&abi_u256_from_u64(POLYGON_CHAIN_ID));
    let domain = keccak256(&encoded);

    let addr = parse_address(wallet.address())?;
    let mut st = Vec::with_capacity(5 * 32);
    st.extend_from_slice(&keccak256_str(
        "ClobAuth(address address,string timestamp,uint256 nonce,string message)",
    ));
    st.extend_from_slice(&abi_address(&addr));
    st.extend_from_slice(&keccak256_str(timestamp));
    st.extend_from_slice(&abi_u256_from_u64(nonce));
    st.extend_from_slice(&keccak256_str(CLOB_AUTH_MESSAGE));
    let struct_hash = keccak256(&st);

    wallet.sign_hash(&signing_hash(&domain, &struct_hash))
}

/// L2 request signing: HMAC-SHA256 over `timestamp + METHOD + path + body`
/// with the base64-decoded secret, URL-safe base64 output.
fn l2_signature(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> VenueResult<String> {
    let secret_bytes = BASE64_URL_SAFE
        .decode(secret)
        .or_else(|_| BASE64_STANDARD.decode(secret))
        .map_err(|e| VenueError::Auth(format!("invalid L2 secret: {e}")))?;
    let mut mac = HmacSha256::new_from_slice(&secret_bytes)
        .map_err(|e| VenueError::Auth(format!("invalid HMAC key: {e}")))?;
    let mut message = format!("{timestamp}{method}{path}");
    if !body.is_empty() {
        message.push_str(body);
    }
    mac.update(message.as_bytes());
    Ok(BASE64_URL_SAFE.encode(mac.finalize().into_bytes()))
}

// === Wire types ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedOrderPayload {
    salt: u64,
    maker: String,
    signer: String,
    taker: String,
    token_id: String,
    maker_amount: String,
    taker_amount: String,
    expiration: String,
    nonce: String,
    fee_rate_bps: String,
    side: String,
    signature_type: u8,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostOrderPayload {
    order: SignedOrderPayload,
    owner: String,
    order_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    #[serde(default, alias = "orderID")]
    order_id: String,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusResponse {
    #[serde(default)]
    size_matched: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    balance: Option<String>,
}

// === Trader ===

/// Authenticated FOK order placement on venue B, proxy mode.
pub struct PolyTrader {
    http: reqwest::Client,
    wallet: Wallet,
    creds: ApiCredentials,
    /// Maker address holding the collateral. Falls back to the signer's own
    /// address when no proxy funder is configured.
    funder: String,
}

impl PolyTrader {
    /// Connect with explicit API credentials, or derive them from the wallet
    /// key at the fixed nonce when absent.
    pub async fn connect(
        private_key: &str,
        api_key: Option<String>,
        api_secret: Option<String>,
        api_passphrase: Option<String>,
        funder: Option<String>,
    ) -> VenueResult<Self> {
        let http = reqwest::Client::new();
        let wallet = Wallet::from_private_key(private_key)?;

        let creds = match (api_key, api_secret, api_passphrase) {
            (Some(api_key), Some(secret), Some(passphrase)) => ApiCredentials {
                api_key,
                secret,
                passphrase,
            },
            _ => {
                info!("[POLY] API credentials absent - deriving from wallet key");
                Self::derive_api_key(&http, &wallet).await?
            }
        };

        let funder = funder.unwrap_or_else(|| wallet.address().to_string());
        info!(
            "[POLY] trader ready, signer={} funder={}",
            &wallet.address()[..10],
            &funder[..funder.len().min(10)],
        );

        Ok(Self {
            http,
            wallet,
            creds,
            funder,
        })
    }

    async fn derive_api_key(http: &reqwest::Client, wallet: &Wallet) -> VenueResult<ApiCredentials> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = clob_auth_signature(wallet, &timestamp, DERIVE_NONCE)?;
        let resp = http
            .get(format!("{CLOB_API_URL}/auth/derive-api-key"))
            .timeout(ORDER_TIMEOUT)
            .header("POLY_ADDRESS", wallet.address())
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", &timestamp)
            .header("POLY_NONCE", DERIVE_NONCE.to_string())
            .send()
            .await
            .map_err(VenueError::from_http)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(VenueError::from_status(status, format!("derive-api-key: {text}")));
        }
        resp.json()
            .await
            .map_err(|e| VenueError::Protocol(format!("derive-api-key response: {e}")))
    }

    /// Available collateral balance in dollars (wire value is 6-decimal raw).
    pub async fn get_balance(&self) -> VenueResult<f64> {
        let path = format!(
            "/balance-allowance?asset_type=COLLATERAL&signature_type={SIGNATURE_TYPE_PROXY}"
        );
        let resp = self
            .l2_get(&path, BALANCE_TIMEOUT)
            .await?;
        let body: BalanceResponse = serde_json::from_str(&resp)
            .map_err(|e| VenueError::Protocol(format!("balance response: {e}")))?;
        let raw: f64 = body
            .balance
            .as_deref()
            .unwrap_or("0")
            .parse()
            .map_err(|e| VenueError::Protocol(format!("balance value: {e}")))?;
        Ok(raw / USDC_DECIMALS_SCALE)
    }

    /// Place a FOK limit BUY for `size` shares at `price` (0–1 fraction).
    /// Returns the venue order id.
    pub async fn place_fok_buy(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
    ) -> VenueResult<String> {
        if !(0.0..1.0).contains(&price) || price <= 0.0 {
            return Err(VenueError::Validation(format!(
                "price must be in (0, 1), got {price}"
            )));
        }
        if size <= 0.0 {
            return Err(VenueError::Validation(format!("size must be positive, got {size}")));
        }

        // BUY: maker pays collateral, taker delivers shares
        let maker_amount = (size * price * USDC_DECIMALS_SCALE).round() as u64;
        let taker_amount = (size * USDC_DECIMALS_SCALE).round() as u64;

        let maker = parse_address(&self.funder)?;
        let signer = parse_address(self.wallet.address())?;
        let salt: u64 = rand::thread_rng().gen();

        let order = Eip712Order {
            salt,
            maker,
            signer,
            token_id,
            maker_amount,
            taker_amount,
            side: SIDE_BUY,
            signature_type: SIGNATURE_TYPE_PROXY,
        };
        let signature = self
            .wallet
            .sign_hash(&signing_hash(&domain_separator()?, &order_struct_hash(&order)))?;

        let payload = PostOrderPayload {
            order: SignedOrderPayload {
                salt,
                maker: self.funder.clone(),
                signer: self.wallet.address().to_string(),
                taker: format!("0x{}", hex::encode([0u8; 20])),
                token_id: token_id.to_string(),
                maker_amount: maker_amount.to_string(),
                taker_amount: taker_amount.to_string(),
                expiration: "0".to_string(),
                nonce: "0".to_string(),
                fee_rate_bps: "0".to_string(),
                side: "BUY".to_string(),
                signature_type: SIGNATURE_TYPE_PROXY,
                signature,
            },
            owner: self.creds.api_key.clone(),
            order_type: "FOK".to_string(),
        };

        let body_json = serde_json::to_string(&payload)
            .map_err(|e| VenueError::Protocol(format!("order encode: {e}")))?;
        let text = self.l2_post("/order", &body_json).await?;
        let resp: CreateOrderResponse = serde_json::from_str(&text)
            .map_err(|e| VenueError::Protocol(format!("order response: {e}")))?;

        if !resp.success || resp.order_id.is_empty() {
            return Err(VenueError::OrderRejected {
                status: 200,
                message: resp.error_msg.unwrap_or_else(|| "order not accepted".to_string()),
            });
        }
        info!(
            "[POLY] BUY token={}... size={:.2} @ {:.4} → id={}",
            &token_id[..token_id.len().min(16)],
            size,
            price,
            resp.order_id,
        );
        Ok(resp.order_id)
    }

    /// Matched share count for an order. FOK fills at most the size×price
    /// budget, so the matched size can differ from the requested size.
    pub async fn get_fill(&self, order_id: &str) -> VenueResult<f64> {
        let path = format!("/data/order/{order_id}");
        let text = self.l2_get(&path, FILL_TIMEOUT).await?;
        let body: OrderStatusResponse = serde_json::from_str(&text)
            .map_err(|e| VenueError::Protocol(format!("order status: {e}")))?;
        body.size_matched
            .as_deref()
            .unwrap_or("0")
            .parse()
            .map_err(|e| VenueError::Protocol(format!("size_matched: {e}")))
    }

    // --- L2 HTTP helpers ---

    async fn l2_get(&self, path: &str, timeout: std::time::Duration) -> VenueResult<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let sig = l2_signature(&self.creds.secret, &timestamp, "GET", path, "")?;
        let resp = self
            .http
            .get(format!("{CLOB_API_URL}{path}"))
            .timeout(timeout)
            .header("POLY_ADDRESS", self.wallet.address())
            .header("POLY_SIGNATURE", sig)
            .header("POLY_TIMESTAMP", &timestamp)
            .header("POLY_API_KEY", &self.creds.api_key)
            .header("POLY_PASSPHRASE", &self.creds.passphrase)
            .send()
            .await
            .map_err(VenueError::from_http)?;
        Self::read(resp).await
    }

    async fn l2_post(&self, path: &str, body_json: &str) -> VenueResult<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let sig = l2_signature(&self.creds.secret, &timestamp, "POST", path, body_json)?;
        let resp = self
            .http
            .post(format!("{CLOB_API_URL}{path}"))
            .timeout(ORDER_TIMEOUT)
            .header("POLY_ADDRESS", self.wallet.address())
            .header("POLY_SIGNATURE", sig)
            .header("POLY_TIMESTAMP", &timestamp)
            .header("POLY_API_KEY", &self.creds.api_key)
            .header("POLY_PASSPHRASE", &self.creds.passphrase)
            .header("Content-Type", "application/json")
            .body(body_json.to_string())
            .send()
            .await
            .map_err(VenueError::from_http)?;
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> VenueResult<String> {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(VenueError::from_status(status.as_u16(), text));
        }
        Ok(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test vector key (hardhat account 0)
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    // =========================================================================
    // Wallet
    // =========================================================================

    #[test]
    fn test_wallet_address_derivation() {
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();
        assert_eq!(wallet.address(), TEST_ADDRESS);

        // 0x prefix tolerated
        let prefixed = Wallet::from_private_key(&format!("0x{TEST_KEY}")).unwrap();
        assert_eq!(prefixed.address(), TEST_ADDRESS);
    }

    #[test]
    fn test_wallet_rejects_garbage() {
        assert!(Wallet::from_private_key("deadbeef").is_err());
        assert!(Wallet::from_private_key("not hex").is_err());
    }

    #[test]
    fn test_sign_hash_shape() {
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();
        let sig = wallet.sign_hash(&[7u8; 32]).unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 132); // 65 bytes hex + prefix
        let v = u8::from_str_radix(&sig[130..], 16).unwrap();
        assert!(v == 27 || v == 28);
    }

    // =========================================================================
    // ABI encoding helpers
    // =========================================================================

    #[test]
    fn test_abi_u256_from_decimal() {
        assert_eq!(abi_u256_from_decimal("0"), [0u8; 32]);

        let one = abi_u256_from_decimal("1");
        assert_eq!(one[31], 1);

        let big = abi_u256_from_decimal("256");
        assert_eq!(big[30], 1);
        assert_eq!(big[31], 0);

        // 10^18
        let quint = abi_u256_from_decimal("1000000000000000000");
        let expected = 10u128.pow(18).to_be_bytes();
        assert_eq!(&quint[16..], &expected[..]);
    }

    #[test]
    fn test_domain_separator_is_stable() {
        let a = domain_separator().unwrap();
        let b = domain_separator().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, [0u8; 32]);
    }

    #[test]
    fn test_order_struct_hash_varies_with_fields() {
        let maker = parse_address(TEST_ADDRESS).unwrap();
        let base = Eip712Order {
            salt: 1,
            maker,
            signer: maker,
            token_id: "123456",
            maker_amount: 1_000_000,
            taker_amount: 2_000_000,
            side: SIDE_BUY,
            signature_type: SIGNATURE_TYPE_PROXY,
        };
        let h1 = order_struct_hash(&base);
        let h2 = order_struct_hash(&Eip712Order { salt: 2, ..base });
        assert_ne!(h1, h2);
    }

    // =========================================================================
    // L2 HMAC
    // =========================================================================

    #[test]
    fn test_l2_signature_deterministic_and_urlsafe() {
        let secret = BASE64_URL_SAFE.encode(b"test-secret-key-bytes");
        let s1 = l2_signature(&secret, "1700000000", "GET", "/order", "").unwrap();
        let s2 = l2_signature(&secret, "1700000000", "GET", "/order", "").unwrap();
        assert_eq!(s1, s2);
        assert!(!s1.contains('+'));
        assert!(!s1.contains('/'));

        let s3 = l2_signature(&secret, "1700000000", "POST", "/order", "{}").unwrap();
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_l2_signature_rejects_bad_secret() {
        assert!(l2_signature("!!!not base64!!!", "1", "GET", "/x", "").is_err());
    }

    // =========================================================================
    // ClobAuth (L1)
    // =========================================================================

    #[test]
    fn test_clob_auth_signature_shape() {
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();
        let sig = clob_auth_signature(&wallet, "1700000000", DERIVE_NONCE).unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 132);

        // Different nonce → different struct hash → different signature
        let sig2 = clob_auth_signature(&wallet, "1700000000", 1).unwrap();
        assert_ne!(sig, sig2);
    }

    #[test]
    fn test_api_credentials_deserialize_camel_case() {
        let json = r#"{"apiKey":"abc123","secret":"c2VjcmV0","passphrase":"pass"}"#;
        let creds: ApiCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.api_key, "abc123");
        assert_eq!(creds.secret, "c2VjcmV0");
        assert_eq!(creds.passphrase, "pass");
    }
}
