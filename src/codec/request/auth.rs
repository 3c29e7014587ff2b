use std::{cmp::min, io::Write};

use sha1::{Digest, Sha1};

use super::Request;
use crate::{
    codec::consts::{keys, RequestType},
    errors::EncodingError,
};

#[derive(Clone, Debug)]
pub(crate) struct Auth {
    pub user: String,
    pub scramble: Vec<u8>,
}

impl Auth {
    pub(crate) fn new(user: &str, password: Option<&str>, salt: &[u8]) -> Self {
        Self {
            user: user.to_owned(),
            scramble: prepare_scramble(password, salt),
        }
    }
}

impl Request for Auth {
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::Auth
    }

    fn encode(&self, mut buf: &mut dyn Write) -> Result<(), EncodingError> {
        rmp::encode::write_map_len(&mut buf, 2)?;
        rmp::encode::write_pfix(&mut buf, keys::USER_NAME)?;
        rmp::encode::write_str(&mut buf, &self.user)?;
        rmp::encode::write_pfix(&mut buf, keys::TUPLE)?;
        rmp::encode::write_array_len(&mut buf, 2)?;
        rmp::encode::write_str(&mut buf, "chap-sha1")?;
        rmp::encode::write_bin(&mut buf, &self.scramble)?;
        Ok(())
    }
}

macro_rules! sha1 {
    ($($data:expr),+) => {
        {
            let mut hasher = Sha1::new();
            $( hasher.update($data); )+
            hasher.finalize().to_vec()
        }
    }
}

/// CHAP-SHA1: `SHA1(password) XOR SHA1(salt || SHA1(SHA1(password)))`.
///
/// Only the first 20 bytes of the salt participate.
fn prepare_scramble(password: Option<&str>, salt: &[u8]) -> Vec<u8> {
    let password = password.unwrap_or("");
    let mut step_1 = sha1!(password.as_bytes());
    let step_2 = sha1!(&step_1);
    let step_3 = sha1!(&salt[0..min(salt.len(), 20)], &step_2);
    // xor(step_1, step_3)
    step_1.iter_mut().zip(step_3).for_each(|(l, r)| *l ^= r);
    step_1
}
