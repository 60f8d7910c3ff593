//! Key material: BIP-39/44 derivation, raw key import, mnemonic generation

use crate::error::{EvmError, EvmResult};

use bip39::{Language, Mnemonic};
use ethers::signers::coins_bip39::English;
use ethers::signers::{LocalWallet, MnemonicBuilder};
use rand::RngCore;

/// Derivation path for account `index`: hardened 44'/60'/0', then 0/index
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// Validate `mnemonic` and derive the key at `derivation_path(index)`
pub fn derive_wallet(mnemonic: &str, index: u32) -> EvmResult<LocalWallet> {
    let phrase = mnemonic.trim();
    if phrase.is_empty() {
        return Err(EvmError::invalid("mnemonic", "<empty>"));
    }

    // Never echo the phrase itself
    Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| EvmError::invalid("mnemonic", format!("<redacted> ({})", e)))?;

    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .derivation_path(&derivation_path(index))
        .map_err(|e| EvmError::Key(format!("invalid derivation path: {}", e)))?
        .build()
        .map_err(|e| EvmError::Key(format!("failed to derive key: {}", e)))
}

/// Import a 32-byte hex private key, with or without `0x`
pub fn wallet_from_private_key(hex_key: &str) -> EvmResult<LocalWallet> {
    let trimmed = hex_key.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if stripped.is_empty() {
        return Err(EvmError::invalid("private key", "<empty>"));
    }

    let bytes = hex::decode(stripped)
        .map_err(|_| EvmError::invalid("private key", "<redacted> (not hex)"))?;
    if bytes.len() != 32 {
        return Err(EvmError::invalid(
            "private key",
            format!("<redacted> ({} bytes, expected 32)", bytes.len()),
        ));
    }

    LocalWallet::from_bytes(&bytes).map_err(|e| EvmError::Key(e.to_string()))
}

/// Fresh 12-word English mnemonic from the thread RNG
pub fn generate_mnemonic() -> EvmResult<String> {
    generate_mnemonic_with_rng(&mut rand::thread_rng())
}

/// 12-word English mnemonic from 128 bits drawn from `rng`
pub fn generate_mnemonic_with_rng<R: RngCore>(rng: &mut R) -> EvmResult<String> {
    let mut entropy = [0u8; 16];
    rng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| EvmError::Key(format!("failed to generate mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::Signer;
    use ethers::types::Address;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MNEMONIC: &str =
        "unaware oxygen allow method allow property predict various slice travel please priority";

    #[test]
    fn test_derivation_path() {
        assert_eq!(derivation_path(0), "m/44'/60'/0'/0/0");
        assert_eq!(derivation_path(7), "m/44'/60'/0'/0/7");
    }

    #[test]
    fn test_derive_known_address() {
        let wallet = derive_wallet(MNEMONIC, 0).unwrap();
        let expected: Address = "0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2".parse().unwrap();
        assert_eq!(wallet.address(), expected);
        assert_eq!(
            hex::encode(wallet.signer().to_bytes()),
            "8c3083c24062f065ff2ee71b21f665375b266cebffa920e8909ec7c48006725d"
        );
    }

    #[test]
    fn test_derive_second_fixture() {
        let wallet = derive_wallet(
            "police saddle quote salon run split notice taxi expand uniform zone excess",
            0,
        )
        .unwrap();
        let expected: Address = "0xD32D26054099DbB5A14387d0cF15Df4452EFE4a9".parse().unwrap();
        assert_eq!(wallet.address(), expected);
    }

    #[test]
    fn test_derivation_is_deterministic_per_index() {
        let a = derive_wallet(MNEMONIC, 1).unwrap();
        let b = derive_wallet(MNEMONIC, 1).unwrap();
        let c = derive_wallet(MNEMONIC, 2).unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn test_bad_mnemonic_rejected() {
        let bad = "unaware oxygen allow method allow property predict various slice travel please wrong";
        let err = derive_wallet(bad, 0).unwrap_err();
        assert!(!err.to_string().contains("unaware"));
        assert!(derive_wallet("   ", 0).is_err());
    }

    #[test]
    fn test_private_key_import() {
        let key = "0x8c3083c24062f065ff2ee71b21f665375b266cebffa920e8909ec7c48006725d";
        let with_prefix = wallet_from_private_key(key).unwrap();
        let without = wallet_from_private_key(&key[2..]).unwrap();
        assert_eq!(with_prefix.address(), without.address());
        assert_eq!(
            with_prefix.address(),
            "0x7161ada3EA6e53E5652A45988DdfF1cE595E09c2".parse::<Address>().unwrap()
        );

        assert!(wallet_from_private_key("").is_err());
        assert!(wallet_from_private_key("0x").is_err());
        assert!(wallet_from_private_key("0xzz").is_err());
        assert!(wallet_from_private_key("0x1234").is_err());
    }

    #[test]
    fn test_generated_mnemonic_is_seeded_and_valid() {
        let a = generate_mnemonic_with_rng(&mut StdRng::seed_from_u64(1)).unwrap();
        let b = generate_mnemonic_with_rng(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.split_whitespace().count(), 12);
        assert!(derive_wallet(&a, 0).is_ok());

        assert_eq!(generate_mnemonic().unwrap().split_whitespace().count(), 12);
    }
}
