// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`LowercaseName`] type.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use super::{Error, Name};

/// A domain name whose ASCII letters are all lowercase.
///
/// Various parts of the DNS involve domain names in all-lowercase form.
/// DNSSEC canonical RR form (defined by [RFC 4034 § 6.2]) requires all
/// ASCII letters in certain domain names to be lowercase. Likewise TSIG
/// MACs are computed using the key name and algorithm name in the
/// canonical form prescribed by DNSSEC (see [RFC 8945 § 4.3.3]), i.e.,
/// all-lowercase form. The NSEC3 hash of [RFC 5155 § 5] is computed
/// over the lowercase form as well.
///
/// For such applications, the `LowercaseName` type provides a wrapper
/// over [`Name`] that is only constructed once the underlying [`Name`]
/// has been folded to lowercase.
///
/// [RFC 4034 § 6.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.2
/// [RFC 5155 § 5]: https://datatracker.ietf.org/doc/html/rfc5155#section-5
/// [RFC 8945 § 4.3.3]: https://datatracker.ietf.org/doc/html/rfc8945#section-4.3.3
#[derive(Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct LowercaseName(Name);

impl From<Name> for LowercaseName {
    fn from(mut name: Name) -> Self {
        name.make_ascii_lowercase();
        Self(name)
    }
}

impl From<LowercaseName> for Name {
    fn from(lowercase: LowercaseName) -> Self {
        lowercase.0
    }
}

impl AsRef<Name> for LowercaseName {
    fn as_ref(&self) -> &Name {
        &self.0
    }
}

impl Borrow<Name> for LowercaseName {
    fn borrow(&self) -> &Name {
        &self.0
    }
}

impl Deref for LowercaseName {
    type Target = Name;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for LowercaseName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Name>().map(Into::into)
    }
}

impl fmt::Display for LowercaseName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.deref().fmt(f)
    }
}

impl fmt::Debug for LowercaseName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.deref().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::LowercaseName;
    use crate::name::Name;

    #[test]
    fn conversion_makes_lowercase() {
        let name: Name = "UPPERCASE.Domain.Test.".parse().unwrap();
        let lowercase = LowercaseName::from(name);
        assert_eq!(
            lowercase.wire_repr(),
            b"\x09uppercase\x06domain\x04test\x00",
        );
    }
}
