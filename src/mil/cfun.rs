//! Algebraic data types and their constructor functions.

use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::error::{InternalError, InternalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataTypeId(u32);
impl DataTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A constructor function, identifying one variant of an algebraic data type.
///
/// Besides its position in the data type, a `Cfun` carries its arity and the number of sibling
/// constructors, which is all the optimiser needs to know about the type itself.
#[derive(Debug, Clone)]
pub struct Cfun {
    ty: DataTypeId,
    tag: usize,
    arity: usize,
    family: usize,
    name: Rc<str>,
}
impl Cfun {
    pub fn data_type(&self) -> DataTypeId {
        self.ty
    }

    /// Position of this constructor within its data type.
    pub fn tag(&self) -> usize {
        self.tag
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of constructors of the data type this constructor belongs to.
    pub fn family(&self) -> usize {
        self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_nullary(&self) -> bool {
        self.arity == 0
    }

    /// Check that the tag is within the bounds of its data type.
    pub fn validate(&self) -> InternalResult<()> {
        if self.tag < self.family {
            Ok(())
        } else {
            Err(InternalError::CfunIndexOutOfRange {
                cfun: self.name.to_string(),
                tag: self.tag,
                family: self.family,
            })
        }
    }

    /// Construct a constructor without registering a data type, as a front end that has already
    /// checked its declarations would.
    pub fn unchecked<S: Into<Rc<str>>>(
        ty: DataTypeId,
        tag: usize,
        arity: usize,
        family: usize,
        name: S,
    ) -> Self {
        Self {
            ty,
            tag,
            arity,
            family,
            name: name.into(),
        }
    }
}
impl PartialEq for Cfun {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.tag == other.tag
    }
}
impl Eq for Cfun {}
impl Hash for Cfun {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.tag.hash(state);
    }
}
impl Display for Cfun {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct DataType {
    pub name: String,
    pub cfuns: Vec<Cfun>,
}

/// All data types declared in a program.
#[derive(Debug, Clone, Default)]
pub struct DataTypes {
    types: Vec<DataType>,
}
impl DataTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a data type with the given constructor names and arities.
    pub fn declare<S: Into<String>>(&mut self, name: S, cfuns: &[(&str, usize)]) -> Vec<Cfun> {
        let ty = DataTypeId(self.types.len() as u32);
        let family = cfuns.len();
        let cfuns: Vec<_> = cfuns
            .iter()
            .enumerate()
            .map(|(tag, (name, arity))| Cfun {
                ty,
                tag,
                arity: *arity,
                family,
                name: Rc::from(*name),
            })
            .collect();
        self.types.push(DataType {
            name: name.into(),
            cfuns: cfuns.clone(),
        });
        cfuns
    }

    pub fn get(&self, ty: DataTypeId) -> Option<&DataType> {
        self.types.get(ty.index())
    }

    /// All constructors of the data type that `cfun` belongs to.
    pub fn siblings(&self, cfun: &Cfun) -> InternalResult<&[Cfun]> {
        cfun.validate()?;
        self.get(cfun.ty)
            .map(|dt| dt.cfuns.as_slice())
            .filter(|cfuns| cfuns.len() == cfun.family)
            .ok_or_else(|| InternalError::CfunIndexOutOfRange {
                cfun: cfun.name.to_string(),
                tag: cfun.tag,
                family: 0,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataType> {
        self.types.iter()
    }
}
