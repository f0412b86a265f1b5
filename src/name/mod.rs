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

//! Implementation of data structures related to domain names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::Index;
use std::str::FromStr;

mod builder;
mod error;
mod label;
mod lowercase;
mod wire;
pub use builder::NameBuilder;
pub use error::Error;
pub use label::Label;
pub use lowercase::LowercaseName;

/// The maximum number of labels in a domain name (including the null
/// root label).
const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A domain name.
///
/// A `Name` is an immutable value holding the uncompressed on-the-wire
/// representation of a fully qualified domain name ([RFC 1035 § 3.1])
/// together with a table giving the offset of each label. Both live in
/// a single heap allocation: the first `n_labels` octets of `data` are
/// the label offsets, and the rest is the wire representation. Keeping
/// the offsets around makes label indexing, suffix extraction, and the
/// right-to-left comparisons of DNSSEC canonical ordering cheap.
///
/// `Name`s can be constructed in several ways:
///
/// * through the [`FromStr`] implementation (with [RFC 4343 § 2.1]
///   escape support);
/// * through a [`NameBuilder`];
/// * from uncompressed on-the-wire data through
///   [`Name::try_from_uncompressed`] and
///   [`Name::try_from_uncompressed_all`]; and
/// * from compressed on-the-wire data through
///   [`Name::try_from_compressed`].
///
/// Within a zone, equal names are interned: the zone owns one
/// representative behind an [`Arc`](std::sync::Arc) and everything
/// else refers to it.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
#[derive(Clone)]
pub struct Name {
    n_labels: u8,
    data: Box<[u8]>,
}

/// Private helpers.
impl Name {
    /// Assembles a `Name` from its parts. The caller must ensure that
    /// `wire` is a valid uncompressed domain name and that
    /// `label_offsets` gives the correct offset of each of its labels.
    fn from_parts(label_offsets: &[u8], wire: &[u8]) -> Self {
        let mut data = Vec::with_capacity(label_offsets.len() + wire.len());
        data.extend_from_slice(label_offsets);
        data.extend_from_slice(wire);
        Self {
            n_labels: label_offsets.len() as u8,
            data: data.into_boxed_slice(),
        }
    }

    /// Returns the offset of label `n` in the `Name`'s on-the-wire
    /// representation.
    fn label_offset(&self, n: usize) -> usize {
        self.label_offsets()[n] as usize
    }

    /// Returns the offsets of the labels in the `Name`'s on-the-wire
    /// representation.
    fn label_offsets(&self) -> &[u8] {
        &self.data[0..self.len()]
    }
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

#[allow(clippy::len_without_is_empty)] // A domain name is never empty!
impl Name {
    /// Returns a `Name` representing the DNS root, `.`.
    pub fn root() -> Self {
        Self {
            n_labels: 1,
            data: vec![0, 0].into_boxed_slice(),
        }
    }

    /// Returns the number of labels in this `Name` (counting the null
    /// root label).
    pub fn len(&self) -> usize {
        self.n_labels as usize
    }

    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.n_labels == 1
    }

    /// Returns whether the `Name` is a wildcard domain name (i.e.,
    /// whether its first label is `*`).
    pub fn is_wildcard(&self) -> bool {
        self[0].is_asterisk()
    }

    /// Returns an iterator over labels in this `Name`.
    pub fn labels(&self) -> Labels {
        Labels::new(self)
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.data[self.len()..]
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// first `n` labels of the `Name`. This will panic if
    /// `n > self.len()`.
    pub fn wire_repr_to(&self, n: usize) -> &[u8] {
        if n == self.len() {
            self.wire_repr()
        } else {
            &self.wire_repr()[0..self.label_offset(n)]
        }
    }

    /// Returns the (uncompressed) on-the-wire representation of the
    /// `Name` starting with the `n`-th label. If `n == self.len()`,
    /// this returns an empty slice; if `n > self.len()`, this panics.
    pub fn wire_repr_from(&self, n: usize) -> &[u8] {
        if n == self.len() {
            &[]
        } else {
            &self.wire_repr()[self.label_offset(n)..]
        }
    }

    /// Returns whether this `Name` is equal to or a subdomain of
    /// `other`.
    pub fn eq_or_subdomain_of(&self, other: &Name) -> bool {
        self.len() >= other.len()
            && self
                .labels()
                .rev()
                .zip(other.labels().rev())
                .all(|(a, b)| a == b)
    }

    /// Returns the number of labels (counting the null root label) in
    /// the longest common suffix of this `Name` and `other`. This is
    /// the primitive underlying closest-encloser computation.
    pub fn matched_labels(&self, other: &Name) -> usize {
        self.labels()
            .rev()
            .zip(other.labels().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Returns the superdomain obtained by skipping the first `skip`
    /// labels of the `Name`, or `None` if there aren't enough labels.
    pub fn superdomain(&self, skip: usize) -> Option<Name> {
        if skip < self.len() {
            let start = self.label_offset(skip);
            let wire = &self.wire_repr()[start..];
            let original_offsets = &self.label_offsets()[skip..];
            let offsets: Vec<u8> = original_offsets
                .iter()
                .map(|offset| offset - original_offsets[0])
                .collect();
            Some(Self::from_parts(&offsets, wire))
        } else {
            None
        }
    }

    /// Constructs a new `Name` by prefixing `suffix` with a single
    /// label. This fails with [`Error::NameTooLong`] if the resulting
    /// name would exceed the wire-length limit.
    pub fn concat(label: &Label, suffix: &Name) -> Result<Name, Error> {
        let added = label.len() + 1;
        if suffix.wire_repr().len() + added > MAX_WIRE_LEN {
            return Err(Error::NameTooLong);
        } else if suffix.len() + 1 > MAX_N_LABELS {
            return Err(Error::NameTooLong);
        }
        let mut offsets = Vec::with_capacity(suffix.len() + 1);
        offsets.push(0);
        offsets.extend(suffix.label_offsets().iter().map(|o| o + added as u8));
        let mut wire = Vec::with_capacity(suffix.wire_repr().len() + added);
        wire.push(label.len() as u8);
        wire.extend_from_slice(label.octets());
        wire.extend_from_slice(suffix.wire_repr());
        Ok(Self::from_parts(&offsets, &wire))
    }

    /// Makes all ASCII letters in this `Name` lowercase.
    ///
    /// This is provided with [RFC 4034 § 6.2] (DNSSEC canonical RR
    /// form) in mind. See also [`LowercaseName`].
    ///
    /// [RFC 4034 § 6.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.2
    pub fn make_ascii_lowercase(&mut self) {
        let start = self.len();
        self.data[start..].make_ascii_lowercase();
    }

    /// Writes the lowercased on-the-wire representation of the `Name`
    /// into `out`. Label length octets are below 64 and hence never
    /// affected by the case folding.
    pub fn lowercase_wire_repr_into(&self, out: &mut Vec<u8>) {
        out.extend(self.wire_repr().iter().map(u8::to_ascii_lowercase));
    }

    /// Tries to parse an uncompressed name present at the start of the
    /// provided buffer. The name need not occupy the entire buffer;
    /// extra data is ignored. If the name is valid, a new `Name` is
    /// returned along with the length of the name in octets.
    pub fn try_from_uncompressed(octets: &[u8]) -> Result<(Name, usize), Error> {
        wire::parse_uncompressed_name(octets, false)
    }

    /// Like [`Name::try_from_uncompressed`], but in addition fails if
    /// there is extra data in the buffer after the name.
    pub fn try_from_uncompressed_all(octets: &[u8]) -> Result<Name, Error> {
        wire::parse_uncompressed_name(octets, true).map(|(name, _)| name)
    }

    /// Validates an uncompressed name present at the start of the
    /// provided buffer without allocating a new `Name`. On success, the
    /// length of the name in octets is returned.
    pub fn validate_uncompressed(octets: &[u8]) -> Result<usize, Error> {
        wire::validate_uncompressed_name(octets, false)
    }

    /// Like [`Name::validate_uncompressed`], but in addition fails if
    /// there is extra data in the buffer after the name.
    pub fn validate_uncompressed_all(octets: &[u8]) -> Result<(), Error> {
        wire::validate_uncompressed_name(octets, true).and(Ok(()))
    }

    /// Tries to parse a compressed name present at index `start` of the
    /// provided buffer. Pointers are followed; indices given in
    /// pointers are treated as indices into `octets` (so generally one
    /// will pass an entire DNS message in `octets`). Two things are
    /// returned on success:
    ///
    /// * the parsed `Name`; and
    /// * the number of contiguous octets read at `start` (equivalently,
    ///   the number of octets to skip after `start` to reach the next
    ///   field when parsing a DNS message).
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Tries to skip a compressed name at the beginning of `octets`.
    /// This continues until the end of the name or the first pointer
    /// label, whichever comes first, and returns the number of octets
    /// read.
    pub fn skip_compressed(octets: &[u8]) -> Result<usize, Error> {
        wire::skip_compressed_name(octets)
    }
}

impl Index<usize> for Name {
    type Output = Label;

    fn index(&self, index: usize) -> &Self::Output {
        let offset = self.label_offset(index);
        let len = self.wire_repr()[offset] as usize;
        let start = offset + 1;
        let end = start + len;
        Label::from_unchecked(&self.wire_repr()[start..end])
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.len() <= 1 {
            f.write_str(".")
        } else {
            // NOTE: the unwrap() is okay, since we never construct
            // Names with no labels.
            let mut labels = self.labels();
            labels.next().unwrap().fmt(f)?;
            for label in labels {
                write!(f, ".{}", label)?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.labels().zip(other.labels()).all(|(a, b)| a == b)
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The [`Ord`] implementation for `Name` employs DNSSEC's canonical
/// ordering of domain names. Per [RFC 4034 § 6.1], `Name`s are ordered
/// as strings of labels read from right to left.
///
/// Note that in this ordering every name sorts after all of its
/// ancestors and before any name that is not an ancestor but shares a
/// shorter common suffix. The zone trees rely on this.
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.labels()
            .rev()
            .zip(other.labels().rev())
            .find_map(|(a, b)| Some(a.cmp(b)).filter(|ordering| ordering.is_ne()))
            .unwrap_or_else(|| self.len().cmp(&other.len()))
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            label.hash(state);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the [`Label`]s in a [`Name`].
///
/// To use this iterator, construct one from a [`Name`] using
/// [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    name: &'a Name,
    front: usize,
    back: usize,
}

impl Labels<'_> {
    fn new(name: &Name) -> Labels {
        Labels {
            name,
            front: 0,
            back: name.len(),
        }
    }
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a Label;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let this_one = self.front;
            self.front += 1;
            Some(&self.name[this_one])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Labels<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back > self.front {
            self.back -= 1;
            Some(&self.name[self.back])
        } else {
            None
        }
    }
}

impl ExactSizeIterator for Labels<'_> {}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII. Escape sequences as defined by
/// [RFC 4343 § 2.1] are supported.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut builder = NameBuilder::new();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go. This is because all
        // multi-byte characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                builder.try_push(value)?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                builder.next_label()?;
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                builder.try_push(octet)?;
                remaining_octets = &remaining_octets[1..];
            }
        }
        builder.finish()
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.len(), 1);
        assert_eq!(root.label_offsets(), &[0]);
        assert_eq!(root.wire_repr(), &[0]);
    }

    #[test]
    fn is_wildcard_works() {
        let wildcard: Name = "*.yarrow.test.".parse().unwrap();
        let not_a_wildcard: Name = "yarrow.test.".parse().unwrap();
        let inner_asterisk: Name = "x.*.yarrow.test.".parse().unwrap();
        assert!(wildcard.is_wildcard());
        assert!(!not_a_wildcard.is_wildcard());
        assert!(!inner_asterisk.is_wildcard());
    }

    #[test]
    fn superdomain_works() {
        let subdomain: Name = "subdomain.example.test.".parse().unwrap();
        let domain: Name = "example.test.".parse().unwrap();
        let tld: Name = "test.".parse().unwrap();
        assert_eq!(subdomain.superdomain(0).as_ref(), Some(&subdomain));
        assert_eq!(subdomain.superdomain(1), Some(domain));
        assert_eq!(subdomain.superdomain(2), Some(tld));
        assert_eq!(subdomain.superdomain(3), Some(Name::root()));
        assert_eq!(subdomain.superdomain(4), None);
    }

    #[test]
    fn concat_works() {
        let suffix: Name = "example.test.".parse().unwrap();
        let label = <&Label>::from(b"www");
        let name = Name::concat(label, &suffix).unwrap();
        assert_eq!(name, "www.example.test.".parse().unwrap());
        assert_eq!(name.wire_repr(), b"\x03www\x07example\x04test\x00");
    }

    #[test]
    fn concat_rejects_overlong_result() {
        let mut name: Name = "x.".parse().unwrap();
        let label = <&Label>::from(b"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx");
        loop {
            match Name::concat(label, &name) {
                Ok(longer) => name = longer,
                Err(e) => {
                    assert_eq!(e, Error::NameTooLong);
                    break;
                }
            }
            assert!(name.wire_repr().len() <= 255);
        }
    }

    #[test]
    fn labels_iterator_works() {
        let name: Name = "a.b.example.test.".parse().unwrap();
        let mut labels = name.labels();
        assert_eq!(labels.next(), Some(b"a".into()));
        assert_eq!(labels.next(), Some(b"b".into()));
        assert_eq!(labels.next(), Some(b"example".into()));
        assert_eq!(labels.next(), Some(b"test".into()));
        assert_eq!(labels.next(), Some(Label::null()));
        assert_eq!(labels.next(), None);
    }

    #[test]
    fn eq_or_subdomain_of_works() {
        let subdomain: Name = "subdomain.example.test.".parse().unwrap();
        let domain: Name = "example.test.".parse().unwrap();
        let tld: Name = "test.".parse().unwrap();
        let root = Name::root();
        assert!(subdomain.eq_or_subdomain_of(&subdomain));
        assert!(subdomain.eq_or_subdomain_of(&domain));
        assert!(subdomain.eq_or_subdomain_of(&tld));
        assert!(subdomain.eq_or_subdomain_of(&root));
        assert!(!domain.eq_or_subdomain_of(&subdomain));
        assert!(domain.eq_or_subdomain_of(&domain));
        assert!(!root.eq_or_subdomain_of(&domain));

        let other_test: Name = "other.test.".parse().unwrap();
        assert!(!domain.eq_or_subdomain_of(&other_test));
        assert!(!other_test.eq_or_subdomain_of(&domain));
    }

    #[test]
    fn matched_labels_works() {
        let a: Name = "x.w.example.test.".parse().unwrap();
        let b: Name = "y.w.example.test.".parse().unwrap();
        let c: Name = "other.".parse().unwrap();
        assert_eq!(a.matched_labels(&b), 4); // w, example, test, root
        assert_eq!(a.matched_labels(&a), 5);
        assert_eq!(a.matched_labels(&c), 1); // root only
    }

    #[test]
    fn wire_repr_to_works() {
        let name: Name = "a.bb.ccc.".parse().unwrap();
        assert_eq!(name.wire_repr_to(0), b"");
        assert_eq!(name.wire_repr_to(1), b"\x01a");
        assert_eq!(name.wire_repr_to(2), b"\x01a\x02bb");
        assert_eq!(name.wire_repr_to(3), b"\x01a\x02bb\x03ccc");
        assert_eq!(name.wire_repr_to(4), b"\x01a\x02bb\x03ccc\x00");
    }

    #[test]
    fn ord_works() {
        // This ordered list is from RFC 4034 § 6.1, which defines the
        // canonical ordering of domain names.
        let names: Vec<Name> = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\\001.z.example.",
            "*.z.example.",
            "\\200.z.example.",
        ]
        .into_iter()
        .map(|n| n.parse().unwrap())
        .collect();

        for (i, ni) in names.iter().enumerate() {
            for (j, nj) in names.iter().enumerate() {
                assert_eq!(i.cmp(&j), ni.cmp(nj));
            }
        }
    }

    #[test]
    fn fromstr_works() {
        let name: Name = "example.test.".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn fromstr_works_for_root() {
        let name: Name = ".".parse().unwrap();
        assert_eq!(name, Name::root());
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_non_fqdn() {
        assert_eq!("non.fqdn".parse::<Name>(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn fromstr_rejects_long_label() {
        assert_eq!(
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx."
                .parse::<Name>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_long_name() {
        assert_eq!(
            "x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x."
                .parse::<Name>(),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Name>(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Name = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.wire_repr(), b"\x01\x00\x02\\.\x00");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Name>(), Err(Error::InvalidEscape));
    }

    #[test]
    fn make_ascii_lowercase_works() {
        let mut name: Name = "UPPERCASE.Domain.Test.".parse().unwrap();
        name.make_ascii_lowercase();
        assert_eq!(name.wire_repr(), b"\x09uppercase\x06domain\x04test\x00");
    }

    #[test]
    fn names_compare_case_insensitively() {
        let a: Name = "Example.Test.".parse().unwrap();
        let b: Name = "eXAMPLE.tEST.".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
