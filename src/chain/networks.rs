//! Well-known EVM networks

/// Human-readable network name for a chain id
pub fn network_name(chain_id: u64) -> String {
    let name = match chain_id {
        0 => return "Unknown Network (chain id not discovered)".to_string(),
        1 => "Ethereum Mainnet",
        5 => "Goerli Testnet",
        10 => "Optimism",
        56 => "BSC Mainnet",
        97 => "BSC Testnet",
        137 => "Polygon Mainnet",
        250 => "Fantom Opera",
        4002 => "Fantom Testnet",
        8453 => "Base",
        84532 => "Base Sepolia",
        42161 => "Arbitrum One",
        421614 => "Arbitrum Sepolia",
        43113 => "Avalanche Fuji Testnet",
        43114 => "Avalanche C-Chain",
        80002 => "Polygon Amoy Testnet",
        11155111 => "Sepolia Testnet",
        11155420 => "Optimism Sepolia",
        other => return format!("Unknown Network (ChainID: {})", other),
    };
    name.to_string()
}

/// Confirmation depth considered practically final on a chain
pub fn recommended_confirmations(chain_id: u64) -> u64 {
    match chain_id {
        // Ethereum mainnet
        1 => 32,
        // Ethereum testnets
        11155111 | 5 => 12,
        // Polygon mainnet
        137 => 128,
        // Polygon testnets
        80002 => 32,
        // Rollups settle on L1
        42161 | 421614 | 10 | 11155420 | 8453 | 84532 => 64,
        // Avalanche (instant finality)
        43114 | 43113 => 1,
        // BSC
        56 | 97 => 15,
        _ => 64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        assert_eq!(network_name(1), "Ethereum Mainnet");
        assert_eq!(network_name(56), "BSC Mainnet");
        assert_eq!(network_name(999_999), "Unknown Network (ChainID: 999999)");
        assert!(network_name(0).contains("not discovered"));
    }

    #[test]
    fn test_confirmations() {
        assert_eq!(recommended_confirmations(1), 32);
        assert_eq!(recommended_confirmations(43114), 1);
        assert_eq!(recommended_confirmations(12345), 64);
    }
}
