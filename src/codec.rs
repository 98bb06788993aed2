//! Binary transaction format
//!
//! Layout (all integers little-endian):
//! - version: u32
//! - vin: varint count, then per input txid (32 bytes, reversed), index u32,
//!   varint-prefixed scriptSig, sequence u32
//! - vout: varint count, then per output value u64, varint-prefixed script
//! - lock_time: u32
//! - when version >= SAPLING_TX_VERSION: presence flag u8, and if set,
//!   value_balance i64, shield spends, shield outputs, binding signature

use crate::constants::*;
use crate::error::{Result, WalletError};
use crate::hashes::Hash;
use crate::transaction::Transaction;
use crate::types::*;

/// Encode a number as a varint
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value <= 0xffffffff {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

/// Cursor over a byte slice. Every read past the end is a parse error.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(WalletError::Parse(format!(
                "unexpected end of data: need {} bytes at offset {}, {} left",
                len,
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.read_bytes(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        match self.read_u8()? {
            0xfd => Ok(self.read_u16_le()? as u64),
            0xfe => Ok(self.read_u32_le()? as u64),
            0xff => self.read_u64_le(),
            n => Ok(n as u64),
        }
    }

    /// Varint used as a length or count; must fit in what is left
    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(WalletError::Parse(format!(
                "length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len as usize)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// 32 bytes stored reversed on the wire
    pub fn read_hash_reversed(&mut self) -> Result<Hash> {
        let mut hash: Hash = self.read_array()?;
        hash.reverse();
        Ok(hash)
    }
}

fn write_var_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&encode_varint(bytes.len() as u64));
    buffer.extend_from_slice(bytes);
}

fn write_hash_reversed(buffer: &mut Vec<u8>, hash: &Hash) {
    buffer.extend(hash.iter().rev());
}

/// Serialize a transaction to wire bytes
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(256);

    buffer.extend_from_slice(&tx.version.to_le_bytes());

    buffer.extend_from_slice(&encode_varint(tx.vin.len() as u64));
    for input in &tx.vin {
        buffer.extend_from_slice(&input.outpoint.txid.to_wire());
        buffer.extend_from_slice(&input.outpoint.n.to_le_bytes());
        write_var_bytes(&mut buffer, &input.script_sig);
        buffer.extend_from_slice(&input.sequence.to_le_bytes());
    }

    buffer.extend_from_slice(&encode_varint(tx.vout.len() as u64));
    for output in &tx.vout {
        buffer.extend_from_slice(&output.value.to_le_bytes());
        write_var_bytes(&mut buffer, &output.script);
    }

    buffer.extend_from_slice(&tx.lock_time.to_le_bytes());

    if tx.has_sapling_version() {
        // `set_shield_data` keeps spends and value balance behind the binding sig
        let Some(binding_sig) = &tx.binding_sig else {
            buffer.push(0);
            return buffer;
        };
        buffer.push(1);
        buffer.extend_from_slice(&tx.value_balance.to_le_bytes());

        buffer.extend_from_slice(&encode_varint(tx.shield_spend.len() as u64));
        for spend in &tx.shield_spend {
            write_hash_reversed(&mut buffer, &spend.cv);
            write_hash_reversed(&mut buffer, &spend.anchor);
            write_hash_reversed(&mut buffer, &spend.nullifier);
            write_hash_reversed(&mut buffer, &spend.rk);
            buffer.extend_from_slice(&spend.proof);
            buffer.extend_from_slice(&spend.spend_auth_sig);
        }

        buffer.extend_from_slice(&encode_varint(tx.shield_output.len() as u64));
        for output in &tx.shield_output {
            write_hash_reversed(&mut buffer, &output.cv);
            write_hash_reversed(&mut buffer, &output.cmu);
            write_hash_reversed(&mut buffer, &output.ephemeral_key);
            buffer.extend_from_slice(&output.enc_ciphertext);
            buffer.extend_from_slice(&output.out_ciphertext);
            buffer.extend_from_slice(&output.proof);
        }

        buffer.extend_from_slice(binding_sig);
    }

    buffer
}

/// Parse wire bytes into a transaction. The whole buffer must be consumed.
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    let mut reader = ByteReader::new(bytes);
    let mut tx = Transaction::default();

    tx.version = reader.read_u32_le()?;

    let vin_len = reader.read_len()?;
    tx.vin = Vec::with_capacity(vin_len);
    for _ in 0..vin_len {
        let txid = Txid(reader.read_hash_reversed()?);
        let n = reader.read_u32_le()?;
        let script_sig = reader.read_var_bytes()?;
        let sequence = reader.read_u32_le()?;
        tx.vin.push(TxIn {
            outpoint: Outpoint { txid, n },
            script_sig,
            sequence,
        });
    }

    let vout_len = reader.read_len()?;
    tx.vout = Vec::with_capacity(vout_len);
    for _ in 0..vout_len {
        let value = reader.read_u64_le()?;
        let script = reader.read_var_bytes()?;
        tx.vout.push(TxOut { script, value });
    }

    tx.lock_time = reader.read_u32_le()?;

    if tx.has_sapling_version() {
        match reader.read_u8()? {
            0 => {}
            1 => {
                tx.value_balance = reader.read_i64_le()?;

                let spend_len = reader.read_len()?;
                for _ in 0..spend_len {
                    tx.shield_spend.push(ShieldSpend {
                        cv: reader.read_hash_reversed()?,
                        anchor: reader.read_hash_reversed()?,
                        nullifier: reader.read_hash_reversed()?,
                        rk: reader.read_hash_reversed()?,
                        proof: reader.read_array()?,
                        spend_auth_sig: reader.read_array()?,
                    });
                }

                let output_len = reader.read_len()?;
                for _ in 0..output_len {
                    tx.shield_output.push(ShieldOutput {
                        cv: reader.read_hash_reversed()?,
                        cmu: reader.read_hash_reversed()?,
                        ephemeral_key: reader.read_hash_reversed()?,
                        enc_ciphertext: reader.read_array()?,
                        out_ciphertext: reader.read_array()?,
                        proof: reader.read_array()?,
                    });
                }

                tx.binding_sig = Some(reader.read_array::<SHIELD_SIG_SIZE>()?);
            }
            flag => {
                return Err(WalletError::Parse(format!(
                    "invalid shield presence flag {:#04x}",
                    flag
                )))
            }
        }
    }

    if reader.remaining() != 0 {
        return Err(WalletError::Parse(format!(
            "{} trailing bytes after transaction",
            reader.remaining()
        )));
    }

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_varint_small() {
        assert_eq!(encode_varint(0x42), vec![0x42]);
        assert_eq!(encode_varint(0xfc), vec![0xfc]);
    }

    #[test]
    fn test_encode_varint_boundaries() {
        assert_eq!(encode_varint(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode_varint(0x1234), vec![0xfd, 0x34, 0x12]);
        assert_eq!(encode_varint(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encode_varint(0x1_0000_0000)[0], 0xff);
        assert_eq!(encode_varint(0x1_0000_0000).len(), 9);
    }

    #[test]
    fn test_read_varint_inverse() {
        for value in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x10000, 0xffff_ffff, u64::MAX] {
            let bytes = encode_varint(value);
            let mut reader = ByteReader::new(&bytes);
            assert_eq!(reader.read_varint().unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_reader_short_buffer() {
        let bytes = [0x01, 0x02];
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(reader.read_u32_le(), Err(WalletError::Parse(_))));
    }

    #[test]
    fn test_decode_truncated_transaction() {
        // version 1, one input, then nothing
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(decode_transaction(&bytes), Err(WalletError::Parse(_))));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        // version 1, no inputs, no outputs, lock time 0, extra byte
        let bytes = [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xaa];
        assert!(matches!(decode_transaction(&bytes), Err(WalletError::Parse(_))));
    }

    #[test]
    fn test_decode_rejects_huge_script_length() {
        // version 1, one input with a script length larger than the buffer
        let mut bytes = vec![1, 0, 0, 0, 1];
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&[0xfe, 0xff, 0xff, 0xff, 0x00]);
        assert!(matches!(decode_transaction(&bytes), Err(WalletError::Parse(_))));
    }

    #[test]
    fn test_sapling_version_without_shield_data() {
        let mut bytes = vec![3, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.push(0);
        let tx = decode_transaction(&bytes).unwrap();
        assert_eq!(tx.version(), 3);
        assert!(!tx.has_shield_data());
        assert_eq!(encode_transaction(&tx), bytes);
    }

    #[test]
    fn test_invalid_shield_flag() {
        let bytes = vec![3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        assert!(matches!(decode_transaction(&bytes), Err(WalletError::Parse(_))));
    }

    #[test]
    fn test_input_txid_is_reversed_on_wire() {
        let mut txid_wire = [0u8; 32];
        txid_wire[0] = 0xaa;
        let mut bytes = vec![1, 0, 0, 0, 1];
        bytes.extend_from_slice(&txid_wire);
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0]);
        let tx = decode_transaction(&bytes).unwrap();
        assert_eq!(tx.vin()[0].outpoint.txid.0[31], 0xaa);
        assert!(tx.vin()[0].outpoint.txid.to_string().ends_with("aa"));
        assert_eq!(encode_transaction(&tx), bytes);
    }

    #[test]
    fn test_shield_section_round_trip() {
        let mut tx = Transaction::default();
        tx.version = SAPLING_TX_VERSION;
        tx.value_balance = -5000;
        tx.shield_output.push(ShieldOutput {
            cv: [1; 32],
            cmu: [2; 32],
            ephemeral_key: [3; 32],
            enc_ciphertext: [4; SHIELD_ENC_CIPHERTEXT_SIZE],
            out_ciphertext: [5; SHIELD_OUT_CIPHERTEXT_SIZE],
            proof: [6; SHIELD_PROOF_SIZE],
        });
        tx.binding_sig = Some([7; SHIELD_SIG_SIZE]);

        let bytes = encode_transaction(&tx);
        // header(4) + vin(1) + vout(1) + lock(4) + flag(1) + balance(8)
        // + spends(1) + outputs(1) + output(96 + 580 + 80 + 192) + sig(64)
        assert_eq!(bytes.len(), 4 + 1 + 1 + 4 + 1 + 8 + 1 + 1 + 948 + 64);
        assert_eq!(bytes[10], 1);

        let decoded = decode_transaction(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.value_balance(), -5000);
    }
}
