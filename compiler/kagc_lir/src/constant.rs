// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

/// Handle of an object on the managed heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapObjectRef(pub usize);

impl fmt::Display for HeapObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<heap object {:#x}>", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),

    /// Address outside the managed heap.
    ExternalReference(usize),
    HeapObject(HeapObjectRef)
}

impl Constant {
    pub fn to_int32(&self) -> Option<i32> {
        match self {
            Self::Int32(value) => Some(*value),
            _ => None
        }
    }

    /// Both integer widths widen to 64 bits.
    pub fn to_int64(&self) -> Option<i64> {
        match self {
            Self::Int32(value) => Some(*value as i64),
            Self::Int64(value) => Some(*value),
            _ => None
        }
    }

    pub fn to_float32(&self) -> Option<f32> {
        match self {
            Self::Float32(value) => Some(*value),
            _ => None
        }
    }

    pub fn to_float64(&self) -> Option<f64> {
        match self {
            Self::Int32(value) => Some(*value as f64),
            Self::Float64(value) => Some(*value),
            _ => None
        }
    }

    pub fn to_external_reference(&self) -> Option<usize> {
        match self {
            Self::ExternalReference(address) => Some(*address),
            _ => None
        }
    }

    pub fn to_heap_object(&self) -> Option<HeapObjectRef> {
        match self {
            Self::HeapObject(object) => Some(*object),
            _ => None
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32(value) => write!(f, "{value}"),
            Self::Int64(value) => write!(f, "{value}l"),
            Self::Float32(value) => write!(f, "{value}f"),
            Self::Float64(value) => write!(f, "{value}"),
            Self::ExternalReference(address) => write!(f, "{address:#x}"),
            Self::HeapObject(object) => write!(f, "{object}"),
        }
    }
}
