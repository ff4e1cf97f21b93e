use std::rc::Rc;
use std::sync::Arc;

/// Strict identity comparison used to gate writes and
/// derived notifications.
///
/// Primitives and strings compare by value, floats treat `NaN`
/// as the same as `NaN`, and shared pointers compare by address.
/// Nothing here ever walks into a structure to compare it deeply:
/// wrap composite values in `Rc` and replace the `Rc` to signal a change.
pub trait Identity {
	fn is_same(&self, other: &Self) -> bool;
}

macro_rules! identity_by_eq {
	($($ty:ty),* $(,)?) => {
		$(
			impl Identity for $ty {
				#[inline]
				fn is_same(&self, other: &Self) -> bool {
					self == other
				}
			}
		)*
	};
}

identity_by_eq!(
	(),
	bool,
	char,
	u8,
	u16,
	u32,
	u64,
	u128,
	usize,
	i8,
	i16,
	i32,
	i64,
	i128,
	isize,
	String,
	&'static str,
);

macro_rules! identity_float {
	($($ty:ty),*) => {
		$(
			impl Identity for $ty {
				#[inline]
				fn is_same(&self, other: &Self) -> bool {
					(self.is_nan() && other.is_nan()) || self == other
				}
			}
		)*
	};
}

identity_float!(f32, f64);

impl<T: ?Sized> Identity for Rc<T> {
	#[inline]
	fn is_same(&self, other: &Self) -> bool {
		Rc::ptr_eq(self, other)
	}
}

impl<T: ?Sized> Identity for Arc<T> {
	#[inline]
	fn is_same(&self, other: &Self) -> bool {
		Arc::ptr_eq(self, other)
	}
}

impl<T: Identity> Identity for Option<T> {
	fn is_same(&self, other: &Self) -> bool {
		match (self, other) {
			(None, None) => true,
			(Some(a), Some(b)) => a.is_same(b),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nan_is_same_as_nan() {
		assert!(f64::NAN.is_same(&f64::NAN));
		assert!(f32::NAN.is_same(&f32::NAN));
		assert!(!1.0f64.is_same(&f64::NAN));
		assert!(0.0f64.is_same(&-0.0));
	}

	#[test]
	fn rc_compares_by_address() {
		let a = Rc::new(vec![1, 2, 3]);
		let b = Rc::new(vec![1, 2, 3]);

		assert!(a.is_same(&a.clone()));
		assert!(!a.is_same(&b));
	}

	#[test]
	fn options_compare_inner_identity() {
		assert!(None::<i32>.is_same(&None));
		assert!(Some(3).is_same(&Some(3)));
		assert!(!Some(3).is_same(&None));
		assert!(!Some(3).is_same(&Some(4)));
	}

	#[test]
	fn strings_compare_by_value() {
		assert!(String::from("a").is_same(&String::from("a")));
		assert!("a".is_same(&"a"));
	}
}
