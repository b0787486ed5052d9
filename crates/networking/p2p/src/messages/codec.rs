//! Binary encoding of the bootstrap messages.
//!
//! Layout: a fixed 8-byte header, then the typed payload. Integers are
//! big-endian except the 16-bit header extensions field, which is
//! little-endian and carries the payload length for framing. Decoding is
//! total; malformed input yields [`DecodeError`], never a panic.

use super::{
    AccountInfoPayload, AckPayload, AscPullAck, AscPullReq, BlocksPayload, FrontiersPayload,
    Message, ReqPayload, MAX_PULL_BLOCKS, MAX_PULL_FRONTIERS,
};
use bytes::{Buf, BufMut};
use strand_common::{Account, Amount, Block, BlockHash, HashOrAccount, Signature};
use thiserror::Error;

pub const MAGIC: u8 = b'S';
pub const NETWORK_ID: u8 = b'X';
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = 8;

/// Serialized state block: type tag + fixed-width fields.
const BLOCK_WIRE_LEN: usize = 1 + 32 + 32 + 32 + 16 + 32 + 64 + 8;
const BLOCK_TYPE_STATE: u8 = 0x06;

/// Message type codes
pub mod message_codes {
    pub const ASC_PULL_REQ: u8 = 0x0e;
    pub const ASC_PULL_ACK: u8 = 0x0f;
}

/// Pull payload type codes
pub mod pull_codes {
    pub const EMPTY: u8 = 0x00;
    pub const BLOCKS: u8 = 0x01;
    pub const ACCOUNT_INFO: u8 = 0x02;
    pub const FRONTIERS: u8 = 0x03;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("bad magic byte {0:#04x}")]
    BadMagic(u8),
    #[error("wrong network id {0:#04x}")]
    WrongNetwork(u8),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    #[error("unknown pull type {0:#04x}")]
    UnknownPullType(u8),
    #[error("unknown block type {0:#04x}")]
    UnknownBlockType(u8),
    #[error("count {0} out of range")]
    CountOutOfRange(u64),
    #[error("payload length {actual} does not match header ({expected})")]
    LengthMismatch { expected: usize, actual: usize },
}

impl Message {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        let message_type = match self {
            Message::AscPullReq(req) => {
                encode_req(req, &mut payload);
                message_codes::ASC_PULL_REQ
            }
            Message::AscPullAck(ack) => {
                encode_ack(ack, &mut payload);
                message_codes::ASC_PULL_ACK
            }
        };
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.put_u8(MAGIC);
        bytes.put_u8(NETWORK_ID);
        bytes.put_u8(VERSION); // max
        bytes.put_u8(VERSION); // using
        bytes.put_u8(VERSION); // min
        bytes.put_u8(message_type);
        bytes.put_u16_le(payload.len() as u16);
        bytes.extend_from_slice(&payload);
        bytes
    }

    pub fn from_bytes(mut buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.remaining() < HEADER_LEN {
            return Err(DecodeError::UnexpectedEof);
        }
        let magic = buf.get_u8();
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let network = buf.get_u8();
        if network != NETWORK_ID {
            return Err(DecodeError::WrongNetwork(network));
        }
        let _version_max = buf.get_u8();
        let version_using = buf.get_u8();
        let _version_min = buf.get_u8();
        if version_using != VERSION {
            return Err(DecodeError::UnsupportedVersion(version_using));
        }
        let message_type = buf.get_u8();
        let payload_len = buf.get_u16_le() as usize;
        if buf.remaining() != payload_len {
            return Err(DecodeError::LengthMismatch {
                expected: payload_len,
                actual: buf.remaining(),
            });
        }
        match message_type {
            message_codes::ASC_PULL_REQ => decode_req(&mut buf).map(Message::AscPullReq),
            message_codes::ASC_PULL_ACK => decode_ack(&mut buf).map(Message::AscPullAck),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

fn encode_req(req: &AscPullReq, buf: &mut Vec<u8>) {
    match &req.payload {
        ReqPayload::Blocks { start, count } => {
            buf.put_u8(pull_codes::BLOCKS);
            buf.put_u64(req.id);
            buf.put_slice(&start.0);
            buf.put_u8(*count);
        }
        ReqPayload::AccountInfo { target } => {
            buf.put_u8(pull_codes::ACCOUNT_INFO);
            buf.put_u64(req.id);
            buf.put_slice(&target.0);
        }
        ReqPayload::Frontiers { start, count } => {
            buf.put_u8(pull_codes::FRONTIERS);
            buf.put_u64(req.id);
            buf.put_slice(start.as_bytes());
            buf.put_u16(*count);
        }
    }
}

fn decode_req(buf: &mut &[u8]) -> Result<AscPullReq, DecodeError> {
    let pull_type = get_u8(buf)?;
    let id = get_u64(buf)?;
    let payload = match pull_type {
        pull_codes::BLOCKS => {
            let start = HashOrAccount(get_bytes32(buf)?);
            let count = get_u8(buf)?;
            if count == 0 || count > MAX_PULL_BLOCKS {
                return Err(DecodeError::CountOutOfRange(count as u64));
            }
            ReqPayload::Blocks { start, count }
        }
        pull_codes::ACCOUNT_INFO => ReqPayload::AccountInfo {
            target: HashOrAccount(get_bytes32(buf)?),
        },
        pull_codes::FRONTIERS => {
            let start = Account(get_bytes32(buf)?);
            let count = get_u16(buf)?;
            if count == 0 || count > MAX_PULL_FRONTIERS {
                return Err(DecodeError::CountOutOfRange(count as u64));
            }
            ReqPayload::Frontiers { start, count }
        }
        other => return Err(DecodeError::UnknownPullType(other)),
    };
    Ok(AscPullReq { id, payload })
}

fn encode_ack(ack: &AscPullAck, buf: &mut Vec<u8>) {
    match &ack.payload {
        AckPayload::Blocks(payload) => {
            buf.put_u8(pull_codes::BLOCKS);
            buf.put_u64(ack.id);
            buf.put_u8(payload.blocks.len() as u8);
            for block in &payload.blocks {
                encode_block(block, buf);
            }
        }
        AckPayload::AccountInfo(payload) => {
            buf.put_u8(pull_codes::ACCOUNT_INFO);
            buf.put_u64(ack.id);
            buf.put_slice(payload.account.as_bytes());
            buf.put_slice(payload.account_open.as_bytes());
            buf.put_slice(payload.account_head.as_bytes());
            buf.put_u64(payload.block_count);
            buf.put_u64(payload.confirmation_height);
            buf.put_slice(payload.confirmation_frontier.as_bytes());
        }
        AckPayload::Frontiers(payload) => {
            buf.put_u8(pull_codes::FRONTIERS);
            buf.put_u64(ack.id);
            buf.put_u16(payload.frontiers.len() as u16);
            for (account, frontier) in &payload.frontiers {
                buf.put_slice(account.as_bytes());
                buf.put_slice(frontier.as_bytes());
            }
        }
        AckPayload::Empty => {
            buf.put_u8(pull_codes::EMPTY);
            buf.put_u64(ack.id);
        }
    }
}

fn decode_ack(buf: &mut &[u8]) -> Result<AscPullAck, DecodeError> {
    let pull_type = get_u8(buf)?;
    let id = get_u64(buf)?;
    let payload = match pull_type {
        pull_codes::BLOCKS => {
            let count = get_u8(buf)?;
            if count > MAX_PULL_BLOCKS {
                return Err(DecodeError::CountOutOfRange(count as u64));
            }
            let mut blocks = Vec::with_capacity(count as usize);
            for _ in 0..count {
                blocks.push(decode_block(buf)?);
            }
            AckPayload::Blocks(BlocksPayload { blocks })
        }
        pull_codes::ACCOUNT_INFO => AckPayload::AccountInfo(AccountInfoPayload {
            account: Account(get_bytes32(buf)?),
            account_open: BlockHash(get_bytes32(buf)?),
            account_head: BlockHash(get_bytes32(buf)?),
            block_count: get_u64(buf)?,
            confirmation_height: get_u64(buf)?,
            confirmation_frontier: BlockHash(get_bytes32(buf)?),
        }),
        pull_codes::FRONTIERS => {
            let count = get_u16(buf)?;
            if count > MAX_PULL_FRONTIERS {
                return Err(DecodeError::CountOutOfRange(count as u64));
            }
            let mut frontiers = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let account = Account(get_bytes32(buf)?);
                let frontier = BlockHash(get_bytes32(buf)?);
                frontiers.push((account, frontier));
            }
            AckPayload::Frontiers(FrontiersPayload { frontiers })
        }
        pull_codes::EMPTY => AckPayload::Empty,
        other => return Err(DecodeError::UnknownPullType(other)),
    };
    Ok(AscPullAck { id, payload })
}

fn encode_block(block: &Block, buf: &mut Vec<u8>) {
    buf.put_u8(BLOCK_TYPE_STATE);
    buf.put_slice(block.account.as_bytes());
    buf.put_slice(block.previous.as_bytes());
    buf.put_slice(block.representative.as_bytes());
    buf.put_slice(&block.balance.to_be_bytes());
    buf.put_slice(&block.link.0);
    buf.put_slice(block.signature.as_bytes());
    buf.put_u64(block.work);
}

fn decode_block(buf: &mut &[u8]) -> Result<Block, DecodeError> {
    if buf.remaining() < BLOCK_WIRE_LEN {
        return Err(DecodeError::UnexpectedEof);
    }
    let block_type = buf.get_u8();
    if block_type != BLOCK_TYPE_STATE {
        return Err(DecodeError::UnknownBlockType(block_type));
    }
    let account = Account(get_bytes32(buf)?);
    let previous = BlockHash(get_bytes32(buf)?);
    let representative = Account(get_bytes32(buf)?);
    let mut balance = [0u8; 16];
    buf.copy_to_slice(&mut balance);
    let link = HashOrAccount(get_bytes32(buf)?);
    let mut signature = [0u8; 64];
    buf.copy_to_slice(&mut signature);
    let work = buf.get_u64();
    Ok(Block {
        account,
        previous,
        representative,
        balance: Amount::from_be_bytes(balance),
        link,
        signature: Signature(signature),
        work,
    })
}

fn get_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut &[u8]) -> Result<u16, DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u16())
}

fn get_u64(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.get_u64())
}

fn get_bytes32(buf: &mut &[u8]) -> Result<[u8; 32], DecodeError> {
    if buf.remaining() < 32 {
        return Err(DecodeError::UnexpectedEof);
    }
    let mut bytes = [0u8; 32];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}
