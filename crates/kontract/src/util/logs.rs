use regex::Regex;
use std::sync::LazyLock;

/// The builder image reports deployment results as marker lines on stdout.
/// These markers are the contract between the operator and the image.
pub const CONTRACT_ADDRESS_MARKER: &str = "Contract Address:";
pub const TRANSACTION_HASH_MARKER: &str = "Transaction Hash:";

static CONTRACT_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Contract Address: (0x[a-fA-F0-9]{40})").unwrap());

static TRANSACTION_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Transaction Hash: (0x[a-fA-F0-9]{64})").unwrap());

pub fn extract_contract_address(logs: &str) -> Option<String> {
    CONTRACT_ADDRESS_RE
        .captures(logs)
        .map(|c| c[1].to_string())
}

pub fn extract_transaction_hash(logs: &str) -> Option<String> {
    TRANSACTION_HASH_RE
        .captures(logs)
        .map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOY_OUTPUT: &str = "\
Compiling 1 files with 0.8.24
Script ran successfully.
Contract Address: 0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9
Transaction Hash: 0x60f2b22b4b1a63a6b38c1a89a152ae9b4b80da6e332e5a3c85f4bba79b4b0f1e
ONCHAIN EXECUTION COMPLETE & SUCCESSFUL.";

    #[test]
    fn extracts_address_and_hash_from_deploy_output() {
        assert_eq!(
            extract_contract_address(DEPLOY_OUTPUT).as_deref(),
            Some("0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9")
        );
        assert_eq!(
            extract_transaction_hash(DEPLOY_OUTPUT).as_deref(),
            Some("0x60f2b22b4b1a63a6b38c1a89a152ae9b4b80da6e332e5a3c85f4bba79b4b0f1e")
        );
    }

    #[test]
    fn ignores_output_without_markers() {
        let logs = "Compiling 1 files\nTests passed\n";
        assert_eq!(extract_contract_address(logs), None);
        assert_eq!(extract_transaction_hash(logs), None);
    }

    #[test]
    fn rejects_truncated_values() {
        // one hex digit short on both lines
        let logs = "Contract Address: 0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc\n\
                    Transaction Hash: 0x60f2b22b4b1a63a6b38c1a89a152ae9b4b80da6e332e5a3c85f4bba79b4b0f1\n";
        assert_eq!(extract_contract_address(logs), None);
        assert_eq!(extract_transaction_hash(logs), None);
    }

    #[test]
    fn takes_first_match_when_repeated() {
        let logs = "Contract Address: 0x5FbDB2315678afecb367f032d93F642f64180aa3\n\
                    Contract Address: 0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9\n";
        assert_eq!(
            extract_contract_address(logs).as_deref(),
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3")
        );
    }
}
