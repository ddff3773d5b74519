//! Static private->public header maps, ported in spirit (not verbatim
//! size) from the hand-maintained tables in `iwyu_include_picker.cc`
//! (`MakeCppIncludeMap`, the C map, and the third-party/symbol maps in the
//! same file). Keys are private header paths (or, in the symbol map,
//! qualified symbol names) without surrounding quotes; values are quoted
//! public headers, or -- when a value has no surrounding quotes -- another
//! private key to keep expanding transitively (see `mod.rs`'s closure).

pub type RawEntry = (&'static str, &'static str);

/// A representative slice of glibc's public/private split.
pub const C_INCLUDE_MAP: &[RawEntry] = &[
    ("bits/types.h", "<stdint.h>"),
    ("bits/stdint-intn.h", "<stdint.h>"),
    ("bits/stdint-uintn.h", "<stdint.h>"),
    ("bits/errno.h", "<errno.h>"),
    ("bits/sigaction.h", "<signal.h>"),
    ("bits/time.h", "<time.h>"),
    ("bits/struct_stat.h", "<sys/stat.h>"),
    ("asm/errno.h", "<errno.h>"),
];

/// A representative slice of libstdc++'s public/private split, the same
/// entries described in the source comment for `cpp_include_map` in
/// `iwyu_include_picker.cc`.
pub const CPP_INCLUDE_MAP: &[RawEntry] = &[
    ("bits/algorithmfwd.h", "<algorithm>"),
    ("bits/allocator.h", "<memory>"),
    ("bits/basic_string.h", "<string>"),
    ("bits/basic_string.tcc", "<string>"),
    ("bits/char_traits.h", "<string>"),
    ("bits/functional_hash.h", "<unordered_map>"),
    ("bits/hashtable.h", "<unordered_map>"),
    ("bits/hashtable.h", "<unordered_set>"),
    ("bits/ios_base.h", "<iostream>"),
    ("bits/ios_base.h", "<ios>"),
    ("bits/stl_algo.h", "<algorithm>"),
    ("bits/stl_algobase.h", "<algorithm>"),
    ("bits/stl_bvector.h", "<vector>"),
    ("bits/stl_construct.h", "<memory>"),
    ("bits/stl_deque.h", "<deque>"),
    ("bits/stl_function.h", "<functional>"),
    ("bits/stl_iterator.h", "<iterator>"),
    ("bits/stl_list.h", "<list>"),
    ("bits/stl_map.h", "<map>"),
    ("bits/stl_multimap.h", "<map>"),
    ("bits/stl_multiset.h", "<set>"),
    ("bits/stl_pair.h", "<utility>"),
    ("bits/stl_queue.h", "<queue>"),
    ("bits/stl_set.h", "<set>"),
    ("bits/stl_stack.h", "<stack>"),
    ("bits/stl_tree.h", "<map>"),
    ("bits/stl_tree.h", "<set>"),
    ("bits/stl_uninitialized.h", "<memory>"),
    ("bits/stl_vector.h", "<vector>"),
    ("bits/stream_iterator.h", "<iterator>"),
    ("bits/streambuf_iterator.h", "<iterator>"),
    ("bits/stringfwd.h", "<string>"),
    ("bits/vector.tcc", "<vector>"),
    ("bits/stl_vector.h", "bits/stl_bvector.h"),
    ("ios", "<ios>"),
    ("ios", "<istream>"),
    ("ios", "<ostream>"),
    ("istream", "<fstream>"),
    ("istream", "<iostream>"),
    ("istream", "<istream>"),
    ("istream", "<sstream>"),
    ("ostream", "<fstream>"),
    ("ostream", "<iostream>"),
    ("ostream", "<istream>"),
    ("ostream", "<ostream>"),
    ("ostream", "<sstream>"),
];

/// Third-party libraries keyed by path *prefix*, matched with
/// `starts_with` rather than an exact key (spec §4.2).
pub const THIRD_PARTY_PREFIX_MAP: &[RawEntry] = &[
    ("third_party/abseil-cpp/absl/strings/internal/", "<absl/strings/str_cat.h>"),
    ("third_party/googletest/internal/", "<gtest/gtest.h>"),
    ("third_party/protobuf/internal/", "<google/protobuf/message.h>"),
];

/// Symbols mapped directly to a public header, the way `operator<<` et al.
/// are mapped in `iwyu_include_picker.cc`'s symbol map.
pub const SYMBOL_MAP: &[RawEntry] = &[
    ("std::swap", "<utility>"),
    ("std::move", "<utility>"),
    ("std::size_t", "<cstddef>"),
    ("NULL", "<cstddef>"),
    ("std::nullptr_t", "<cstddef>"),
];
