//! Construction, signing and proto-encoding of Cosmos transactions.

use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::cosmos::crypto::secp256k1::PubKey;
use ibc_proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
use ibc_proto::cosmos::tx::v1beta1::{
    AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use ibc_proto::google::protobuf::Any;
use prost::Message;

use crate::keyring::Wallet;

const SECP256K1_PUB_KEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// SIGN_MODE_DIRECT
const SIGN_MODE: i32 = 1;

/// Account state needed to sign, fetched from the auth module.
#[derive(Copy, Clone, Debug)]
pub struct AccountInfo {
    pub number: u64,
    pub sequence: u64,
}

/// Build a signed transaction wrapping `messages` and return the
/// proto-encoded `TxRaw`, ready to broadcast.
pub fn sign_and_encode_tx(
    chain_id: &str,
    gas_denom: &str,
    wallet: &Wallet,
    account: AccountInfo,
    gas: u64,
    messages: Vec<Any>,
    memo: &str,
) -> Vec<u8> {
    let body = TxBody {
        messages,
        memo: memo.to_string(),
        timeout_height: 0,
        extension_options: Vec::new(),
        non_critical_extension_options: Vec::new(),
    };
    let body_bytes = body.encode_to_vec();

    let auth_info = AuthInfo {
        signer_infos: vec![signer_info(wallet, account.sequence)],
        fee: Some(fee_for_gas(gas_denom, gas)),
        tip: None,
    };
    let auth_info_bytes = auth_info.encode_to_vec();

    let sign_doc = SignDoc {
        body_bytes: body_bytes.clone(),
        auth_info_bytes: auth_info_bytes.clone(),
        chain_id: chain_id.to_string(),
        account_number: account.number,
    };
    let signature = wallet.sign(&sign_doc.encode_to_vec());

    let tx_raw = TxRaw {
        body_bytes,
        auth_info_bytes,
        signatures: vec![signature],
    };

    tx_raw.encode_to_vec()
}

fn signer_info(wallet: &Wallet, sequence: u64) -> SignerInfo {
    let pub_key = PubKey {
        key: wallet.public_key().serialize().to_vec(),
    };

    SignerInfo {
        public_key: Some(Any {
            type_url: SECP256K1_PUB_KEY_TYPE_URL.to_string(),
            value: pub_key.encode_to_vec(),
        }),
        mode_info: Some(ModeInfo {
            sum: Some(Sum::Single(Single { mode: SIGN_MODE })),
        }),
        sequence,
    }
}

fn fee_for_gas(gas_denom: &str, gas: u64) -> Fee {
    Fee {
        amount: vec![Coin {
            denom: gas_denom.to_string(),
            amount: gas.to_string(),
        }],
        gas_limit: gas,
        payer: String::new(),
        granter: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::keyring::AddressType;

    use super::*;

    const TEST_KEY: &str = "2e09165b257a4f2b05b8acff46a28e2c861e0cbad4a3e7989bd53e2992b847d7";

    fn test_wallet() -> Wallet {
        Wallet::from_private_key_hex(
            "signer",
            TEST_KEY,
            &AddressType::Cosmos {
                account_prefix: "cosmos".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn signed_tx_round_trips_and_carries_the_messages() {
        let message = Any {
            type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
            value: vec![1, 2, 3],
        };

        let tx_bytes = sign_and_encode_tx(
            "provider",
            "uatom",
            &test_wallet(),
            AccountInfo {
                number: 7,
                sequence: 3,
            },
            200_000,
            vec![message.clone()],
            "",
        );

        let tx_raw = TxRaw::decode(tx_bytes.as_slice()).unwrap();

        let body = TxBody::decode(tx_raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages, vec![message]);

        let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice()).unwrap();
        let fee = auth_info.fee.unwrap();
        assert_eq!(fee.gas_limit, 200_000);
        assert_eq!(fee.amount[0].denom, "uatom");
        assert_eq!(auth_info.signer_infos[0].sequence, 3);

        // compact ECDSA, no recovery byte
        assert_eq!(tx_raw.signatures[0].len(), 64);
    }

    #[test]
    fn signing_is_deterministic_for_the_same_inputs() {
        let account = AccountInfo {
            number: 1,
            sequence: 1,
        };

        let a = sign_and_encode_tx("chain", "stake", &test_wallet(), account, 1, vec![], "");
        let b = sign_and_encode_tx("chain", "stake", &test_wallet(), account, 1, vec![], "");

        assert_eq!(a, b);
    }
}
