use std::str::FromStr;

use alloy::rpc::client::RpcClient;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::json;
use solana_pubkey::Pubkey;
use tracing::{debug, trace};

use super::{
    AccountData, CompiledInstruction, Ledger, ProgramAccount, SignatureInfo, TransactionInfo,
    method,
};
use crate::{error::DataError, types::Slot};

/// Maximum number of addresses per `getMultipleAccounts` request.
const MULTIPLE_ACCOUNTS_CHUNK: usize = 100;

const COMMITMENT: &str = "confirmed";

/// [`Ledger`] over Solana JSON-RPC.
///
/// Wraps an alloy [`RpcClient`], so throttling and retries are configured by
/// the layers the client was built with.
#[derive(Clone, derive_more::Debug)]
pub struct RpcLedger {
    #[debug(skip)]
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(client: RpcClient) -> Self { Self { client } }

    pub fn client(&self) -> &RpcClient { &self.client }
}

#[derive(Debug, Deserialize)]
struct Context {
    slot: Slot,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    context: Context,
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignature {
    signature: String,
    slot: Slot,
    err: Option<serde_json::Value>,
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UiConfirmedTransaction {
    slot: Slot,
    transaction: Option<UiTransaction>,
    meta: Option<UiMeta>,
}

#[derive(Debug, Deserialize)]
struct UiTransaction {
    message: Option<UiMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiMessage {
    account_keys: Vec<String>,
    instructions: Vec<UiInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiInstruction {
    program_id_index: usize,
    accounts: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiMeta {
    #[serde(default)]
    loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Default, Deserialize)]
struct LoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

fn parse_pubkey(s: &str) -> Result<Pubkey, DataError> {
    Pubkey::from_str(s).map_err(|err| DataError::InvalidResponse(format!("bad address {}: {}", s, err)))
}

impl UiAccount {
    fn decode(&self) -> Result<Vec<u8>, DataError> {
        let (payload, encoding) = &self.data;
        if encoding != "base64" {
            return Err(DataError::InvalidResponse(format!("unexpected encoding {}", encoding)));
        }
        STANDARD
            .decode(payload)
            .map_err(|err| DataError::InvalidResponse(format!("bad base64 payload: {}", err)))
    }
}

impl UiConfirmedTransaction {
    fn into_info(self, signature: &str) -> Result<Option<TransactionInfo>, DataError> {
        let Some(message) = self.transaction.and_then(|tx| tx.message) else {
            return Ok(None);
        };
        let loaded = self.meta.and_then(|m| m.loaded_addresses).unwrap_or_default();
        let account_keys = message
            .account_keys
            .iter()
            .chain(loaded.writable.iter())
            .chain(loaded.readonly.iter())
            .map(|k| parse_pubkey(k))
            .collect::<Result<Vec<_>, _>>()?;
        let instructions = message
            .instructions
            .into_iter()
            .map(|ix| CompiledInstruction { program_id_index: ix.program_id_index, accounts: ix.accounts })
            .collect();
        Ok(Some(TransactionInfo {
            signature: signature.to_string(),
            slot: self.slot,
            account_keys,
            instructions,
        }))
    }
}

impl Ledger for RpcLedger {
    async fn account(&self, address: &Pubkey, min_slot: Slot) -> Result<AccountData, DataError> {
        let mut config = json!({ "encoding": "base64", "commitment": COMMITMENT });
        if min_slot > 0 {
            config["minContextSlot"] = json!(min_slot);
        }
        let response: WithContext<Option<UiAccount>> = self
            .client
            .request(method::GET_ACCOUNT_INFO, (address.to_string(), config))
            .await?;
        let account = response.value.ok_or(DataError::AccountNotFound(*address))?;
        trace!(%address, slot = response.context.slot, "account read");
        Ok(AccountData { data: account.decode()?, slot: response.context.slot })
    }

    async fn program_accounts(
        &self,
        program: &Pubkey,
        data_size: usize,
    ) -> Result<Vec<ProgramAccount>, DataError> {
        let config = json!({
            "encoding": "base64",
            "commitment": COMMITMENT,
            "filters": [{ "dataSize": data_size }],
        });
        let response: Vec<KeyedAccount> = self
            .client
            .request(method::GET_PROGRAM_ACCOUNTS, (program.to_string(), config))
            .await?;
        debug!(%program, data_size, accounts = response.len(), "program accounts scanned");
        response
            .into_iter()
            .map(|keyed| {
                Ok(ProgramAccount { address: parse_pubkey(&keyed.pubkey)?, data: keyed.account.decode()? })
            })
            .collect()
    }

    async fn multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MULTIPLE_ACCOUNTS_CHUNK) {
            let keys = chunk.iter().map(|a| a.to_string()).collect::<Vec<_>>();
            let config = json!({ "encoding": "base64", "commitment": COMMITMENT });
            let response: WithContext<Vec<Option<UiAccount>>> =
                self.client.request(method::GET_MULTIPLE_ACCOUNTS, (keys, config)).await?;
            for account in response.value {
                accounts.push(account.map(|a| a.decode()).transpose()?);
            }
        }
        Ok(accounts)
    }

    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, DataError> {
        let config = json!({ "limit": limit, "commitment": COMMITMENT });
        let response: Vec<UiSignature> = self
            .client
            .request(method::GET_SIGNATURES_FOR_ADDRESS, (address.to_string(), config))
            .await?;
        Ok(response
            .into_iter()
            .map(|s| SignatureInfo {
                signature: s.signature,
                slot: s.slot,
                block_time: s.block_time,
                failed: s.err.is_some(),
            })
            .collect())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<TransactionInfo>, DataError> {
        let config = json!({
            "encoding": "json",
            "commitment": COMMITMENT,
            "maxSupportedTransactionVersion": 0,
        });
        let response: Option<UiConfirmedTransaction> = self
            .client
            .request(method::GET_TRANSACTION, (signature.to_string(), config))
            .await?;
        match response {
            Some(tx) => tx.into_info(signature),
            None => Ok(None),
        }
    }
}
