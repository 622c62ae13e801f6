//! Runtime ABI of the generated C.
//!
//! Names of the support structures, built-in members and generated symbols that the C backend emits
//! and that the reflection tables describe. The [`PRELUDE`] defines the structures themselves.
//!
//! ## Notes
//! - Built-in member names (`taille`, `pointeur`, `info`) are also the C field names, so member
//!   access on strings, slices and boxed values lowers to a plain `.` access.
//! - [`TypeInfoKind`] discriminants are written into `KuriTypeInfo::genre`; changing their order
//!   changes the ABI.

/// String view: `{ int8_t *pointeur; int64_t taille; }`.
pub const STRING_STRUCT: &str = "KuriStr";
/// Boxed value: `{ void *pointeur; KuriTypeInfo *info; }`.
pub const ANY_STRUCT: &str = "KuriAny";
/// Reflection record describing one type.
pub const TYPE_INFO_STRUCT: &str = "KuriTypeInfo";
/// Reflection record describing one struct field.
pub const FIELD_INFO_STRUCT: &str = "KuriFieldInfo";

/// Name of the opaque compound exposing [`TYPE_INFO_STRUCT`] to Kuri code.
pub const TYPE_INFO_COMPOUND: &str = "InfoType";

/// Entry point of a Kuri program; kept unmangled and called from the C `main`.
pub const ENTRY_POINT: &str = "principale";

/// Length of a string, slice or fixed array.
pub const MEMBER_LENGTH: &str = "taille";
/// Data pointer of a string, slice, fixed array or boxed value.
pub const MEMBER_POINTER: &str = "pointeur";
/// Type-info pointer of a boxed value.
pub const MEMBER_INFO: &str = "info";
/// Storage member of fixed-array wrapper structs.
pub const ARRAY_DATA: &str = "data";

/// Resume index field of a coroutine state record.
pub const COROUTINE_RESUME: &str = "__reprend_coro";
/// Finished flag of a coroutine state record.
pub const COROUTINE_FINISHED: &str = "__termine_coro";
/// Prefix of coroutine state record type names.
pub const COROUTINE_STATE_PREFIX: &str = "__etat_coro";
/// Name of the state record parameter inside a lowered coroutine.
pub const COROUTINE_STATE_PARAM: &str = "__etat";
/// Prefix of the state fields receiving yielded values (`__sortie0`, `__sortie1`, ...).
pub const COROUTINE_OUTPUT_PREFIX: &str = "__sortie";
/// Prefix of the labels a coroutine resumes at.
pub const COROUTINE_RESUME_LABEL: &str = "__reprise";

/// Prefix of hidden output-pointer parameters of multi-value functions.
pub const RETURN_SLOT_PREFIX: &str = "__ret";

/// Function run by `main` before the entry point to initialise globals.
pub const GLOBALS_INIT: &str = "__kuri_initialise_globales";

/// Category of a reflection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInfoKind {
    Integer,
    Real,
    Bool,
    Byte,
    Nothing,
    String,
    Any,
    Pointer,
    Reference,
    Array,
    Slice,
    Function,
    Struct,
    Enum,
    Opaque,
}

impl TypeInfoKind {
    /// Value stored in `KuriTypeInfo::genre`.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Support structures every translation unit starts with.
pub const PRELUDE: &str = "\
#include <math.h>
#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>

typedef struct KuriTypeInfo KuriTypeInfo;

typedef struct KuriStr {
    int8_t *pointeur;
    int64_t taille;
} KuriStr;

typedef struct KuriAny {
    void *pointeur;
    KuriTypeInfo *info;
} KuriAny;

typedef struct KuriFieldInfo {
    KuriStr nom;
    int64_t decalage;
    KuriTypeInfo *type;
} KuriFieldInfo;

struct KuriTypeInfo {
    int32_t genre;
    int64_t taille_en_octet;
    bool est_signe;
    KuriStr nom;
    KuriTypeInfo *type_pointe;
    int64_t nombre_elements;
    KuriFieldInfo *membres;
    int64_t nombre_membres;
    KuriTypeInfo **types_entree;
    int64_t nombre_entrees;
    KuriTypeInfo **types_sortie;
    int64_t nombre_sorties;
};
";
