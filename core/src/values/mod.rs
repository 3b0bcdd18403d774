mod delta;
mod dict;
mod display;
mod function;
mod items;
mod object;
mod value;

pub use delta::{CalendarDelta, days_in_month, is_leap_year, weekday_from_index};
pub use dict::{Dict, HashKey, ValueSet};
pub use display::{format_duration, format_float};
pub use function::{Args, BoundMethod, Builtin, ListMethod, UserFunction};
pub use items::Items;
pub use object::DomainObject;
pub use value::{MAX_VALUE_DEPTH, Number, Value};
