//! Well-known framework types and attributes.
//!
//! The decoder recognizes a fixed set of framework shapes (primitives, collections, tasks,
//! nullable, compiler attributes) by full name. Both tables map in both directions, are built
//! once on first use and never change afterwards.

use std::{collections::HashMap, sync::LazyLock};

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::metadata::typesystem::ELEMENT_TYPE;

macro_rules! known_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident, $lookup:ident {
            $($variant:ident => $full_name:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
        $vis enum $name {
            $(
                #[doc = $full_name]
                $variant,
            )*
        }

        impl $name {
            /// The canonical full name
            #[must_use]
            pub fn full_name(self) -> &'static str {
                match self {
                    $($name::$variant => $full_name,)*
                }
            }

            /// Look up a full name, `None` if it is not a well-known name
            #[must_use]
            pub fn from_name(full_name: &str) -> Option<$name> {
                $lookup.get(full_name).copied()
            }
        }

        static $lookup: LazyLock<HashMap<&'static str, $name>> =
            LazyLock::new(|| $name::iter().map(|known| (known.full_name(), known)).collect());
    };
}

known_table! {
    /// Framework types the decoder recognizes by name.
    pub enum KnownType, KNOWN_TYPES {
        Void => "System.Void",
        Boolean => "System.Boolean",
        Char => "System.Char",
        SByte => "System.SByte",
        Byte => "System.Byte",
        Int16 => "System.Int16",
        UInt16 => "System.UInt16",
        Int32 => "System.Int32",
        UInt32 => "System.UInt32",
        Int64 => "System.Int64",
        UInt64 => "System.UInt64",
        Single => "System.Single",
        Double => "System.Double",
        String => "System.String",
        Object => "System.Object",
        IntPtr => "System.IntPtr",
        UIntPtr => "System.UIntPtr",
        TypedReference => "System.TypedReference",
        Decimal => "System.Decimal",
        DateTime => "System.DateTime",
        DateTimeOffset => "System.DateTimeOffset",
        TimeSpan => "System.TimeSpan",
        Guid => "System.Guid",
        ValueType => "System.ValueType",
        Enum => "System.Enum",
        Delegate => "System.Delegate",
        MulticastDelegate => "System.MulticastDelegate",
        Type => "System.Type",
        Array => "System.Array",
        Attribute => "System.Attribute",
        Exception => "System.Exception",
        Nullable => "System.Nullable`1",
        ValueTuple1 => "System.ValueTuple`1",
        ValueTuple2 => "System.ValueTuple`2",
        ValueTuple3 => "System.ValueTuple`3",
        ValueTuple4 => "System.ValueTuple`4",
        ValueTuple5 => "System.ValueTuple`5",
        ValueTuple6 => "System.ValueTuple`6",
        ValueTuple7 => "System.ValueTuple`7",
        ValueTuple8 => "System.ValueTuple`8",
        Span => "System.Span`1",
        ReadOnlySpan => "System.ReadOnlySpan`1",
        Memory => "System.Memory`1",
        ReadOnlyMemory => "System.ReadOnlyMemory`1",
        Index => "System.Index",
        Range => "System.Range",
        FormattableString => "System.FormattableString",
        IDisposable => "System.IDisposable",
        IAsyncDisposable => "System.IAsyncDisposable",
        IComparable => "System.IComparable",
        IComparableT => "System.IComparable`1",
        IEquatable => "System.IEquatable`1",
        IEnumerable => "System.Collections.IEnumerable",
        IEnumerator => "System.Collections.IEnumerator",
        IEnumerableT => "System.Collections.Generic.IEnumerable`1",
        IEnumeratorT => "System.Collections.Generic.IEnumerator`1",
        ICollection => "System.Collections.Generic.ICollection`1",
        IList => "System.Collections.Generic.IList`1",
        IReadOnlyCollection => "System.Collections.Generic.IReadOnlyCollection`1",
        IReadOnlyList => "System.Collections.Generic.IReadOnlyList`1",
        IDictionary => "System.Collections.Generic.IDictionary`2",
        IReadOnlyDictionary => "System.Collections.Generic.IReadOnlyDictionary`2",
        ISet => "System.Collections.Generic.ISet`1",
        List => "System.Collections.Generic.List`1",
        Dictionary => "System.Collections.Generic.Dictionary`2",
        HashSet => "System.Collections.Generic.HashSet`1",
        KeyValuePair => "System.Collections.Generic.KeyValuePair`2",
        IAsyncEnumerable => "System.Collections.Generic.IAsyncEnumerable`1",
        IAsyncEnumerator => "System.Collections.Generic.IAsyncEnumerator`1",
        Task => "System.Threading.Tasks.Task",
        TaskT => "System.Threading.Tasks.Task`1",
        ValueTask => "System.Threading.Tasks.ValueTask",
        ValueTaskT => "System.Threading.Tasks.ValueTask`1",
        CancellationToken => "System.Threading.CancellationToken",
        IsExternalInit => "System.Runtime.CompilerServices.IsExternalInit",
        IsVolatile => "System.Runtime.CompilerServices.IsVolatile",
        IsConst => "System.Runtime.CompilerServices.IsConst",
    }
}

known_table! {
    /// Attribute types the decoder recognizes by name.
    pub enum KnownAttribute, KNOWN_ATTRIBUTES {
        Nullable => "System.Runtime.CompilerServices.NullableAttribute",
        NullableContext => "System.Runtime.CompilerServices.NullableContextAttribute",
        NullablePublicOnly => "System.Runtime.CompilerServices.NullablePublicOnlyAttribute",
        Extension => "System.Runtime.CompilerServices.ExtensionAttribute",
        ParamArray => "System.ParamArrayAttribute",
        IsReadOnly => "System.Runtime.CompilerServices.IsReadOnlyAttribute",
        IsByRefLike => "System.Runtime.CompilerServices.IsByRefLikeAttribute",
        IsUnmanaged => "System.Runtime.CompilerServices.IsUnmanagedAttribute",
        Dynamic => "System.Runtime.CompilerServices.DynamicAttribute",
        NativeInteger => "System.Runtime.CompilerServices.NativeIntegerAttribute",
        TupleElementNames => "System.Runtime.CompilerServices.TupleElementNamesAttribute",
        RequiresLocation => "System.Runtime.CompilerServices.RequiresLocationAttribute",
        ScopedRef => "System.Runtime.CompilerServices.ScopedRefAttribute",
        RefSafetyRules => "System.Runtime.CompilerServices.RefSafetyRulesAttribute",
        CompilerGenerated => "System.Runtime.CompilerServices.CompilerGeneratedAttribute",
        CompilerFeatureRequired => "System.Runtime.CompilerServices.CompilerFeatureRequiredAttribute",
        RequiredMember => "System.Runtime.CompilerServices.RequiredMemberAttribute",
        DecimalConstant => "System.Runtime.CompilerServices.DecimalConstantAttribute",
        DateTimeConstant => "System.Runtime.CompilerServices.DateTimeConstantAttribute",
        PreserveBaseOverrides => "System.Runtime.CompilerServices.PreserveBaseOverridesAttribute",
        InternalsVisibleTo => "System.Runtime.CompilerServices.InternalsVisibleToAttribute",
        TypeForwardedTo => "System.Runtime.CompilerServices.TypeForwardedToAttribute",
        AsyncStateMachine => "System.Runtime.CompilerServices.AsyncStateMachineAttribute",
        IteratorStateMachine => "System.Runtime.CompilerServices.IteratorStateMachineAttribute",
        Embedded => "Microsoft.CodeAnalysis.EmbeddedAttribute",
        DefaultMember => "System.Reflection.DefaultMemberAttribute",
        Obsolete => "System.ObsoleteAttribute",
        Flags => "System.FlagsAttribute",
        AttributeUsage => "System.AttributeUsageAttribute",
        Serializable => "System.SerializableAttribute",
        Conditional => "System.Diagnostics.ConditionalAttribute",
        SetsRequiredMembers => "System.Diagnostics.CodeAnalysis.SetsRequiredMembersAttribute",
        EditorBrowsable => "System.ComponentModel.EditorBrowsableAttribute",
        StructLayout => "System.Runtime.InteropServices.StructLayoutAttribute",
        Optional => "System.Runtime.InteropServices.OptionalAttribute",
        In => "System.Runtime.InteropServices.InAttribute",
        Out => "System.Runtime.InteropServices.OutAttribute",
    }
}

impl KnownType {
    /// The known type of a primitive `ELEMENT_TYPE_*` code
    #[must_use]
    pub fn from_element_type(code: u8) -> Option<KnownType> {
        Some(match code {
            ELEMENT_TYPE::VOID => KnownType::Void,
            ELEMENT_TYPE::BOOLEAN => KnownType::Boolean,
            ELEMENT_TYPE::CHAR => KnownType::Char,
            ELEMENT_TYPE::I1 => KnownType::SByte,
            ELEMENT_TYPE::U1 => KnownType::Byte,
            ELEMENT_TYPE::I2 => KnownType::Int16,
            ELEMENT_TYPE::U2 => KnownType::UInt16,
            ELEMENT_TYPE::I4 => KnownType::Int32,
            ELEMENT_TYPE::U4 => KnownType::UInt32,
            ELEMENT_TYPE::I8 => KnownType::Int64,
            ELEMENT_TYPE::U8 => KnownType::UInt64,
            ELEMENT_TYPE::R4 => KnownType::Single,
            ELEMENT_TYPE::R8 => KnownType::Double,
            ELEMENT_TYPE::STRING => KnownType::String,
            ELEMENT_TYPE::OBJECT => KnownType::Object,
            ELEMENT_TYPE::I => KnownType::IntPtr,
            ELEMENT_TYPE::U => KnownType::UIntPtr,
            ELEMENT_TYPE::TYPEDBYREF => KnownType::TypedReference,
            _ => return None,
        })
    }

    /// The `ELEMENT_TYPE_*` code of a primitive
    #[must_use]
    pub fn element_type(self) -> Option<u8> {
        Some(match self {
            KnownType::Void => ELEMENT_TYPE::VOID,
            KnownType::Boolean => ELEMENT_TYPE::BOOLEAN,
            KnownType::Char => ELEMENT_TYPE::CHAR,
            KnownType::SByte => ELEMENT_TYPE::I1,
            KnownType::Byte => ELEMENT_TYPE::U1,
            KnownType::Int16 => ELEMENT_TYPE::I2,
            KnownType::UInt16 => ELEMENT_TYPE::U2,
            KnownType::Int32 => ELEMENT_TYPE::I4,
            KnownType::UInt32 => ELEMENT_TYPE::U4,
            KnownType::Int64 => ELEMENT_TYPE::I8,
            KnownType::UInt64 => ELEMENT_TYPE::U8,
            KnownType::Single => ELEMENT_TYPE::R4,
            KnownType::Double => ELEMENT_TYPE::R8,
            KnownType::String => ELEMENT_TYPE::STRING,
            KnownType::Object => ELEMENT_TYPE::OBJECT,
            KnownType::IntPtr => ELEMENT_TYPE::I,
            KnownType::UIntPtr => ELEMENT_TYPE::U,
            KnownType::TypedReference => ELEMENT_TYPE::TYPEDBYREF,
            _ => return None,
        })
    }

    /// True for the types a signature can name with a single element type code
    #[must_use]
    pub fn is_primitive(self) -> bool {
        self.element_type().is_some()
    }

    /// True for integer primitives usable as an enum's underlying type
    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            KnownType::Boolean
                | KnownType::Char
                | KnownType::SByte
                | KnownType::Byte
                | KnownType::Int16
                | KnownType::UInt16
                | KnownType::Int32
                | KnownType::UInt32
                | KnownType::Int64
                | KnownType::UInt64
                | KnownType::IntPtr
                | KnownType::UIntPtr
        )
    }

    /// True if the type is a value type
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(
            self,
            KnownType::String
                | KnownType::Object
                | KnownType::ValueType
                | KnownType::Enum
                | KnownType::Delegate
                | KnownType::MulticastDelegate
                | KnownType::Type
                | KnownType::Array
                | KnownType::Attribute
                | KnownType::Exception
                | KnownType::FormattableString
                | KnownType::IDisposable
                | KnownType::IAsyncDisposable
                | KnownType::IComparable
                | KnownType::IComparableT
                | KnownType::IEquatable
                | KnownType::IEnumerable
                | KnownType::IEnumerator
                | KnownType::IEnumerableT
                | KnownType::IEnumeratorT
                | KnownType::ICollection
                | KnownType::IList
                | KnownType::IReadOnlyCollection
                | KnownType::IReadOnlyList
                | KnownType::IDictionary
                | KnownType::IReadOnlyDictionary
                | KnownType::ISet
                | KnownType::List
                | KnownType::Dictionary
                | KnownType::HashSet
                | KnownType::IAsyncEnumerable
                | KnownType::IAsyncEnumerator
                | KnownType::Task
                | KnownType::TaskT
                | KnownType::IsExternalInit
                | KnownType::IsVolatile
                | KnownType::IsConst
        )
    }

    /// Simple name, the part after the last `.`
    #[must_use]
    pub fn name(self) -> &'static str {
        let full_name = self.full_name();
        full_name.rsplit('.').next().unwrap_or(full_name)
    }

    /// Namespace, the part before the last `.`
    #[must_use]
    pub fn namespace(self) -> &'static str {
        let full_name = self.full_name();
        full_name.rsplit_once('.').map_or("", |(namespace, _)| namespace)
    }
}

/// The well-known type named `full_name`
#[must_use]
pub fn name_to_known_type(full_name: &str) -> Option<KnownType> {
    KnownType::from_name(full_name)
}

/// Full name of a well-known type
#[must_use]
pub fn known_type_to_name(known: KnownType) -> &'static str {
    known.full_name()
}

/// The well-known attribute named `full_name`
#[must_use]
pub fn name_to_known_attribute(full_name: &str) -> Option<KnownAttribute> {
    KnownAttribute::from_name(full_name)
}

/// Full name of a well-known attribute
#[must_use]
pub fn known_attribute_to_name(known: KnownAttribute) -> &'static str {
    known.full_name()
}
