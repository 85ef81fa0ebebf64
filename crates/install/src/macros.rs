//! Macros for run option builders

/// Generate `new`, `Default` and `with_*` setters for an options struct.
///
/// Fields listed under `optional` are stored as `Option<T>` and their setters
/// take a bare `T`. Every struct also carries `event_sender`.
#[macro_export]
macro_rules! options_builder {
    (
        $name:ident {
            $($field:ident: $ty:ty),* $(,)?
        }
        optional {
            $($opt:ident: $opt_ty:ty),* $(,)?
        }
    ) => {
        paste::paste! {
            impl $name {
                /// Create options with default values
                #[must_use]
                pub fn new() -> Self {
                    Self {
                        $($field: Default::default(),)*
                        $($opt: None,)*
                        event_sender: None,
                    }
                }

                $( #[must_use]
                pub fn [<with_ $field>](mut self, value: $ty) -> Self {
                    self.$field = value;
                    self
                } )*

                $( #[must_use]
                pub fn [<with_ $opt>](mut self, value: $opt_ty) -> Self {
                    self.$opt = Some(value);
                    self
                } )*

                /// Set the event sender for run events
                #[must_use]
                pub fn with_event_sender(mut self, sender: aucat_events::EventSender) -> Self {
                    self.event_sender = Some(sender);
                    self
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }
        }
    };
}
