//! Canonical binary form of a prepared escrow, as needed for signing.
//!
//! Only the fields an `EscrowCreate` can carry are supported. Fields are
//! written sorted by (type code, field code).

use super::keys::{decode_address, sha512_half, Keypair};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{PreparedTx, SignedTx, MAX_DROPS};

/// "STX\0" - single-signing prefix
const SIGNING_PREFIX: [u8; 4] = [0x53, 0x54, 0x58, 0x00];
/// "TXN\0" - transaction id prefix
const TX_ID_PREFIX: [u8; 4] = [0x54, 0x58, 0x4E, 0x00];

mod type_code {
    pub const UINT16: u8 = 1;
    pub const UINT32: u8 = 2;
    pub const AMOUNT: u8 = 6;
    pub const BLOB: u8 = 7;
    pub const ACCOUNT: u8 = 8;
}

enum FieldValue {
    UInt16(u16),
    UInt32(u32),
    Amount(u64),
    Blob(Vec<u8>),
    Account([u8; 20]),
}

struct Field {
    type_code: u8,
    field_code: u8,
    value: FieldValue,
}

impl Field {
    fn new(type_code: u8, field_code: u8, value: FieldValue) -> Self {
        Self { type_code, field_code, value }
    }
}

/// Sign `prepared` with `keypair`. `prepared` is only read.
pub fn sign(prepared: &PreparedTx, keypair: &Keypair, address: &str) -> LedgerResult<SignedTx> {
    if prepared.tx.account != address {
        return Err(LedgerError::Signing(format!(
            "transaction account {} does not match wallet {}",
            prepared.tx.account, address
        )));
    }
    let public_key = keypair.public_key();

    let mut message = SIGNING_PREFIX.to_vec();
    message.extend(encode(prepared, &public_key, None)?);
    let signature = keypair.sign(&message);

    let blob = encode(prepared, &public_key, Some(signature.as_slice()))?;
    Ok(SignedTx {
        hash: transaction_hash(&blob),
        tx_blob: hex::encode_upper(&blob),
        last_ledger_sequence: Some(prepared.last_ledger_sequence),
    })
}

/// SHA512Half("TXN\0" ‖ blob), uppercase hex.
pub fn transaction_hash(blob: &[u8]) -> String {
    let mut data = TX_ID_PREFIX.to_vec();
    data.extend_from_slice(blob);
    hex::encode_upper(sha512_half(&data))
}

fn encode(prepared: &PreparedTx, public_key: &[u8], signature: Option<&[u8]>) -> LedgerResult<Vec<u8>> {
    let mut fields = fields(prepared, public_key, signature)?;
    fields.sort_by_key(|f| (f.type_code, f.field_code));

    let mut out = Vec::with_capacity(256);
    for field in &fields {
        write_field_id(&mut out, field.type_code, field.field_code);
        match &field.value {
            FieldValue::UInt16(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::UInt32(v) => out.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Amount(drops) => out.extend_from_slice(&native_amount(*drops)?),
            FieldValue::Blob(bytes) => {
                write_length(&mut out, bytes.len())?;
                out.extend_from_slice(bytes);
            }
            FieldValue::Account(id) => {
                write_length(&mut out, id.len())?;
                out.extend_from_slice(id);
            }
        }
    }
    Ok(out)
}

fn fields(prepared: &PreparedTx, public_key: &[u8], signature: Option<&[u8]>) -> LedgerResult<Vec<Field>> {
    use self::type_code::*;
    let tx = &prepared.tx;

    let mut fields = vec![
        Field::new(UINT16, 2, FieldValue::UInt16(tx.transaction_type.code())),
        Field::new(UINT32, 4, FieldValue::UInt32(prepared.sequence)),
        Field::new(UINT32, 27, FieldValue::UInt32(prepared.last_ledger_sequence)),
        Field::new(AMOUNT, 1, FieldValue::Amount(tx.amount_drops()?)),
        Field::new(AMOUNT, 8, FieldValue::Amount(prepared.fee_drops()?)),
        Field::new(BLOB, 3, FieldValue::Blob(public_key.to_vec())),
        Field::new(ACCOUNT, 1, FieldValue::Account(account_id("Account", &tx.account)?)),
        Field::new(ACCOUNT, 3, FieldValue::Account(account_id("Destination", &tx.destination)?)),
    ];
    if let Some(tag) = tx.destination_tag {
        fields.push(Field::new(UINT32, 14, FieldValue::UInt32(tag)));
    }
    if let Some(at) = tx.cancel_after {
        fields.push(Field::new(UINT32, 36, FieldValue::UInt32(at)));
    }
    if let Some(at) = tx.finish_after {
        fields.push(Field::new(UINT32, 37, FieldValue::UInt32(at)));
    }
    if let Some(sig) = signature {
        fields.push(Field::new(BLOB, 4, FieldValue::Blob(sig.to_vec())));
    }
    Ok(fields)
}

fn account_id(field: &str, address: &str) -> LedgerResult<[u8; 20]> {
    decode_address(address).ok_or_else(|| LedgerError::Signing(format!("{} is not a valid address: {}", field, address)))
}

fn write_field_id(out: &mut Vec<u8>, type_code: u8, field_code: u8) {
    match (type_code < 16, field_code < 16) {
        (true, true) => out.push(type_code << 4 | field_code),
        (false, true) => out.extend_from_slice(&[field_code, type_code]),
        (true, false) => out.extend_from_slice(&[type_code << 4, field_code]),
        (false, false) => out.extend_from_slice(&[0, type_code, field_code]),
    }
}

fn write_length(out: &mut Vec<u8>, len: usize) -> LedgerResult<()> {
    match len {
        0..=192 => out.push(len as u8),
        193..=12_480 => {
            let n = len - 193;
            out.extend_from_slice(&[193 + (n >> 8) as u8, (n & 0xff) as u8]);
        }
        12_481..=918_744 => {
            let n = len - 12_481;
            out.extend_from_slice(&[241 + (n >> 16) as u8, ((n >> 8) & 0xff) as u8, (n & 0xff) as u8]);
        }
        _ => return Err(LedgerError::Signing(format!("field too long: {} bytes", len))),
    }
    Ok(())
}

/// Native amount: bit 63 clear (XRP), bit 62 set (positive), low bits = drops.
fn native_amount(drops: u64) -> LedgerResult<[u8; 8]> {
    if drops > MAX_DROPS {
        return Err(LedgerError::Signing(format!("amount out of range: {} drops", drops)));
    }
    Ok((drops | 0x4000_0000_0000_0000).to_be_bytes())
}
