use std::io::Write;

use crate::errors::EncodingError;

/// Single element of a MessagePack tuple.
pub trait TupleElement {
    fn encode_into_writer<W: Write>(&self, buf: W) -> Result<(), EncodingError>;
}

impl<T: serde::Serialize> TupleElement for T {
    fn encode_into_writer<W: Write>(&self, mut buf: W) -> Result<(), EncodingError> {
        rmp_serde::encode::write(&mut buf, self)?;
        Ok(())
    }
}

/// Trait, describing type, which can be encoded into MessagePack tuple.
///
/// It is used to pass keys, tuples and arguments to requests, like
/// passing arguments for `CALL`.
pub trait Tuple {
    fn encode_into_writer<W: Write>(&self, buf: W) -> Result<(), EncodingError>;
}

impl<T: TupleElement> Tuple for Vec<T> {
    fn encode_into_writer<W: Write>(&self, mut buf: W) -> Result<(), EncodingError> {
        rmp::encode::write_array_len(&mut buf, self.len() as u32)?;
        for x in self.iter() {
            x.encode_into_writer(&mut buf)?;
        }
        Ok(())
    }
}

impl<T: TupleElement> Tuple for &[T] {
    fn encode_into_writer<W: Write>(&self, mut buf: W) -> Result<(), EncodingError> {
        rmp::encode::write_array_len(&mut buf, self.len() as u32)?;
        for x in self.iter() {
            x.encode_into_writer(&mut buf)?;
        }
        Ok(())
    }
}

impl Tuple for () {
    fn encode_into_writer<W: Write>(&self, mut buf: W) -> Result<(), EncodingError> {
        rmp::encode::write_array_len(&mut buf, 0)?;
        Ok(())
    }
}

impl<T: Tuple> Tuple for &T {
    fn encode_into_writer<W: Write>(&self, buf: W) -> Result<(), EncodingError> {
        (*self).encode_into_writer(buf)
    }
}

macro_rules! count_elements {
    () => { 0u32 };
    ($head:ident $($rest:ident)*) => { 1u32 + count_elements!($($rest)*) };
}

macro_rules! impl_tuple_for_tuple {
    ($($param:ident),+) => {
        impl<$($param: TupleElement),+> Tuple for ($($param,)+) {
            #[allow(non_snake_case)]
            fn encode_into_writer<W: Write>(&self, mut buf: W) -> Result<(), EncodingError> {
                rmp::encode::write_array_len(&mut buf, count_elements!($($param)+))?;
                let ($($param,)+) = self;
                $( $param.encode_into_writer(&mut buf)?; )+
                Ok(())
            }
        }
    };
}

impl_tuple_for_tuple!(T0);
impl_tuple_for_tuple!(T0, T1);
impl_tuple_for_tuple!(T0, T1, T2);
impl_tuple_for_tuple!(T0, T1, T2, T3);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_tuple_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15);
