//! 型ディスクリプタのデコード
//!
//! リモートメモリ上の固定レイアウトレコードを `TypeDescriptor` として
//! 解釈します。デコードは読み取ったバイト列の純関数であり、同じアドレスは
//! 常に同じディスクリプタにデコードされるため、アドレスをキーに
//! キャッシュします（再アタッチ時のみ無効化）。

use crate::errors::DecodeError;
use crate::layout::{LayoutTable, MAX_GENERIC_ARGS, MAX_NAME_BYTES};
use crate::reader::RemoteReader;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// ランタイム型の種別
///
/// 未知のタグは `Unknown` にデコードされます。新しいランタイムバージョンが
/// 追加した種別でウォーク全体を中断しないためです。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Struct,
    Class,
    Enum,
    Protocol,
    Tuple,
    Function,
    Existential,
    Metatype,
    Opaque,
    Unknown(u32),
}

impl TypeKind {
    /// 種別タグから型種別を判定する
    pub fn from_tag(tag: u32) -> TypeKind {
        match tag {
            0 => TypeKind::Struct,
            1 => TypeKind::Class,
            2 => TypeKind::Enum,
            3 => TypeKind::Protocol,
            4 => TypeKind::Tuple,
            5 => TypeKind::Function,
            6 => TypeKind::Existential,
            7 => TypeKind::Metatype,
            8 => TypeKind::Opaque,
            other => TypeKind::Unknown(other),
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeKind::Struct => write!(f, "struct"),
            TypeKind::Class => write!(f, "class"),
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Protocol => write!(f, "protocol"),
            TypeKind::Tuple => write!(f, "tuple"),
            TypeKind::Function => write!(f, "function"),
            TypeKind::Existential => write!(f, "existential"),
            TypeKind::Metatype => write!(f, "metatype"),
            TypeKind::Opaque => write!(f, "opaque"),
            TypeKind::Unknown(tag) => write!(f, "unknown({:#x})", tag),
        }
    }
}

/// デコード済みの型ディスクリプタ
///
/// デコード後は不変です。`address` は再検証とシンボル化のために
/// 必ず元のリモートアドレスを保持します。
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// ディスクリプタのリモートアドレス
    pub address: u64,
    /// 型の種別
    pub kind: TypeKind,
    /// ランタイムフラグ（そのまま保持）
    pub flags: u32,
    /// 型名
    pub name: String,
    /// フィールド/ケース数
    pub field_count: u32,
    /// ジェネリックパラメータ数
    pub generic_param_count: u32,
}

/// NUL終端の名前文字列を読み取る
///
/// 短い読み取りはエラーになる契約のため、マップ境界をまたぐ一括読みは
/// できません。上限バイト数まで1バイトずつ読み進めます。
fn read_name(reader: &dyn RemoteReader, address: u64) -> Result<String, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "name",
        });
    }

    let mut bytes = Vec::new();
    for offset in 0..MAX_NAME_BYTES {
        let b = reader.read_u8(address + offset as u64)?;
        if b == 0 {
            return String::from_utf8(bytes).map_err(|_| DecodeError::BadUtf8 { address });
        }
        bytes.push(b);
    }

    Err(DecodeError::UnterminatedName {
        address,
        limit: MAX_NAME_BYTES,
    })
}

/// 型ディスクリプタをデコードする
pub fn decode_type_descriptor(
    reader: &dyn RemoteReader,
    layout: &LayoutTable,
    address: u64,
) -> Result<TypeDescriptor, DecodeError> {
    if address == 0 {
        return Err(DecodeError::NullPointer {
            address,
            what: "descriptor",
        });
    }

    let tag = reader.read_u32(address + layout.desc_kind as u64)?;
    let flags = reader.read_u32(address + layout.desc_flags as u64)?;
    let name_ptr = reader.read_ptr(address + layout.desc_name as u64)?;
    let field_count = reader.read_u32(address + layout.desc_field_count as u64)?;
    let generic_param_count = reader.read_u32(address + layout.desc_generic_count as u64)?;

    if generic_param_count > MAX_GENERIC_ARGS {
        return Err(DecodeError::CountOutOfRange {
            address,
            what: "generic parameter",
            count: generic_param_count,
            limit: MAX_GENERIC_ARGS,
        });
    }

    let name = read_name(reader, name_ptr)?;

    Ok(TypeDescriptor {
        address,
        kind: TypeKind::from_tag(tag),
        flags,
        name,
        field_count,
        generic_param_count,
    })
}

/// アドレスをキーにしたディスクリプタキャッシュ
///
/// ひとつのアタッチメントの間だけ有効です。再アタッチ時は新しい
/// キャッシュを作成してください。
pub struct DescriptorCache {
    entries: RefCell<HashMap<u64, Rc<TypeDescriptor>>>,
}

impl DescriptorCache {
    /// 空のキャッシュを作成する
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// ディスクリプタを取得する（未キャッシュならデコードして登録）
    pub fn get(
        &self,
        reader: &dyn RemoteReader,
        layout: &LayoutTable,
        address: u64,
    ) -> Result<Rc<TypeDescriptor>, DecodeError> {
        if let Some(desc) = self.entries.borrow().get(&address) {
            return Ok(Rc::clone(desc));
        }

        let desc = Rc::new(decode_type_descriptor(reader, layout, address)?);
        self.entries
            .borrow_mut()
            .insert(address, Rc::clone(&desc));
        Ok(desc)
    }

    /// キャッシュ済みエントリ数を取得する
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// キャッシュが空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// キャッシュを空にする
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}
