//! Device descriptors and target-device matching.

use bluer::Address;
use smol_str::SmolStr;

/// Address and advertised name identifying a Bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
   pub address: Address,
   pub name: Option<SmolStr>,
}

impl DeviceDescriptor {
   pub fn new(address: Address, name: Option<impl Into<SmolStr>>) -> Self {
      Self {
         address,
         name: name.map(Into::into),
      }
   }

   /// The advertised name, or the empty string when the device has none.
   pub fn name_or_empty(&self) -> &str {
      self.name.as_deref().unwrap_or_default()
   }
}

/// Case-insensitive substring matcher for the tracked product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatcher {
   pattern: SmolStr,
}

impl TargetMatcher {
   pub fn new(pattern: &str) -> Self {
      Self {
         pattern: pattern.to_lowercase().into(),
      }
   }

   pub fn matches(&self, name: &str) -> bool {
      name.to_lowercase().contains(self.pattern.as_str())
   }

   /// Returns the descriptor's name if it belongs to the target device.
   pub fn match_descriptor<'a>(&self, descriptor: &'a DeviceDescriptor) -> Option<&'a str> {
      let name = descriptor.name_or_empty();
      self.matches(name).then_some(name)
   }
}

impl Default for TargetMatcher {
   fn default() -> Self {
      Self::new("jib")
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_matches_any_casing() {
      let matcher = TargetMatcher::default();
      for name in ["Jib True 2", "JIB", "my jib buds", "sKuLLcandy jIb"] {
         assert!(matcher.matches(name), "{name} should match");
      }
      for name in ["AirPods Pro", "J I B", "", "Jabra"] {
         assert!(!matcher.matches(name), "{name} should not match");
      }
   }

   #[test]
   fn test_pattern_is_case_folded() {
      let matcher = TargetMatcher::new("JiB");
      assert!(matcher.matches("jib true 2"));
   }

   #[test]
   fn test_nameless_descriptor_never_matches() {
      let matcher = TargetMatcher::default();
      let descriptor = DeviceDescriptor::new(Address::any(), None::<&str>);
      assert_eq!(matcher.match_descriptor(&descriptor), None);

      let descriptor = DeviceDescriptor::new(Address::any(), Some("Jib True 2 Left"));
      assert_eq!(matcher.match_descriptor(&descriptor), Some("Jib True 2 Left"));
   }
}
