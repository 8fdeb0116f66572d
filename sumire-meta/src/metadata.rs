//! メタデータインスタンスのデコード
//!
//! 具体化された型メタデータ（ディスクリプタ + 解決済みジェネリック引数）を
//! 解釈します。引数配列の長さはディスクリプタが宣言するパラメータ数に
//! 従い、それを超えて読み進めることはありません。

use crate::descriptor::{DescriptorCache, TypeDescriptor};
use crate::errors::DecodeError;
use crate::layout::LayoutTable;
use crate::reader::RemoteReader;
use std::rc::Rc;

/// プリミティブ型参照
///
/// ジェネリック引数ワードの最下位ビットが立っている場合、残りのビットが
/// このコードを表します。未知のコードは `Unknown` にデコードされます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Never,
    Unit,
    Bool,
    Int,
    UInt,
    Float32,
    Float64,
    Str,
    RawPointer,
    Unknown(u32),
}

impl PrimitiveType {
    /// プリミティブコードから型を判定する
    pub fn from_code(code: u32) -> PrimitiveType {
        match code {
            0 => PrimitiveType::Never,
            1 => PrimitiveType::Unit,
            2 => PrimitiveType::Bool,
            3 => PrimitiveType::Int,
            4 => PrimitiveType::UInt,
            5 => PrimitiveType::Float32,
            6 => PrimitiveType::Float64,
            7 => PrimitiveType::Str,
            8 => PrimitiveType::RawPointer,
            other => PrimitiveType::Unknown(other),
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PrimitiveType::Never => write!(f, "Never"),
            PrimitiveType::Unit => write!(f, "Unit"),
            PrimitiveType::Bool => write!(f, "Bool"),
            PrimitiveType::Int => write!(f, "Int"),
            PrimitiveType::UInt => write!(f, "UInt"),
            PrimitiveType::Float32 => write!(f, "Float32"),
            PrimitiveType::Float64 => write!(f, "Float64"),
            PrimitiveType::Str => write!(f, "String"),
            PrimitiveType::RawPointer => write!(f, "RawPointer"),
            PrimitiveType::Unknown(code) => write!(f, "primitive({:#x})", code),
        }
    }
}

/// 解決済みのジェネリック引数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericArg {
    /// 別のメタデータインスタンスへの参照（リモートアドレス）
    Instance(u64),
    /// プリミティブ型参照
    Primitive(PrimitiveType),
}

/// デコード済みのメタデータインスタンスヘッダ
///
/// 引数のインスタンス参照はアドレスのまま保持します。木としての展開は
/// ウォーカー側が訪問済み集合を使って行います。
#[derive(Debug, Clone)]
pub struct InstanceHeader {
    /// インスタンスのリモートアドレス
    pub address: u64,
    /// 型ディスクリプタ
    pub descriptor: Rc<TypeDescriptor>,
    /// ジェネリック引数（宣言されたパラメータ数ぶん）
    pub args: Vec<GenericArg>,
}

/// メタデータインスタンスをデコードする
pub fn decode_instance(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    cache: &DescriptorCache,
    address: u64,
) -> Result<InstanceHeader, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "metadata instance",
        });
    }

    let desc_addr = reader.read_ptr(address + layout.inst_descriptor as u64)?;
    if desc_addr == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "descriptor",
        });
    }

    let descriptor = cache.get(reader, layout, desc_addr)?;

    let pw = layout.pointer_size() as u64;
    let mut args = Vec::with_capacity(descriptor.generic_param_count as usize);
    for i in 0..descriptor.generic_param_count as u64 {
        let word = reader.read_ptr(address + layout.inst_args as u64 + i * pw)?;
        if word & 1 == 1 {
            args.push(GenericArg::Primitive(PrimitiveType::from_code(
                (word >> 1) as u32,
            )));
        } else {
            args.push(GenericArg::Instance(word));
        }
    }

    Ok(InstanceHeader {
        address,
        descriptor,
        args,
    })
}
