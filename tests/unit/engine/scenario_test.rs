#[cfg(test)]
mod engine_scenario_tests {
    use crate::common::builders::ItemRecordBuilder;
    use crate::common::mocks::InMemoryContext;
    use lightbox::filters::TagMatch;
    use lightbox::lister::{ListerCore, ListerEvent};
    use lightbox::models::{AlbumId, Collection, ItemId, ItemRecord, TagId};
    use lightbox::view::{MaterializedView, RowRange, ViewEvent};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(context: Arc<InMemoryContext>) -> (ListerCore, MaterializedView) {
        let core = ListerCore::new(context, Duration::from_millis(50), Duration::from_millis(50));
        (core, MaterializedView::new())
    }

    fn img(id: i64) -> ItemRecord {
        ItemRecordBuilder::image(id).build()
    }

    fn album(id: i32) -> Collection {
        Collection::Album {
            id: AlbumId::new(id),
        }
    }

    /// Drain the core's outbox into the view, returning both streams.
    fn pump(
        core: &mut ListerCore,
        view: &mut MaterializedView,
    ) -> (Vec<ListerEvent>, Vec<ViewEvent>) {
        let events = core.take_events();
        let mut rows = Vec::new();
        for event in &events {
            rows.extend(view.apply(event));
        }
        (events, rows)
    }

    fn view_ids(view: &MaterializedView) -> Vec<i64> {
        view.items().iter().map(|item| item.id.get()).collect()
    }

    #[test]
    fn test_tagged_browsing_session() {
        let context = Arc::new(InMemoryContext::new());
        for id in [2, 4] {
            context.tag_item(ItemId::new(id), TagId::new(7));
        }
        let (mut core, mut view) = engine(context);

        core.open(Some(album(5)));
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(ticket, (1..=5).map(img).collect());
        core.job_finished(ticket, Ok(()));
        pump(&mut core, &mut view);
        assert_eq!(view_ids(&view), vec![1, 2, 3, 4, 5]);
        assert_eq!(core.matched_ids().len(), 5);

        // Narrowing to one tag thins the filtered plane; the
        // materialized superset keeps every row.
        core.set_tag_filter(HashSet::from([TagId::new(7)]), TagMatch::AnyOf, false);
        core.fire_recompute_deadline();
        let (events, rows) = pump(&mut core, &mut view);
        let left: Vec<i64> = events
            .iter()
            .filter_map(|event| match event {
                ListerEvent::FilteredItemRemoved(item) => Some(item.id.get()),
                _ => None,
            })
            .collect();
        assert_eq!(left, vec![1, 3, 5]);
        assert!(events.contains(&ListerEvent::FilterMatch(true)));
        assert!(rows.is_empty());
        assert_eq!(view_ids(&view), vec![1, 2, 3, 4, 5]);

        // Item 3 disappears from the store; the refresh reconciles the
        // view down to one removed row, survivors untouched.
        core.refresh();
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(ticket, [1, 2, 4, 5].into_iter().map(img).collect());
        core.job_finished(ticket, Ok(()));
        let (_, rows) = pump(&mut core, &mut view);

        assert_eq!(rows, vec![ViewEvent::RowsRemoved(vec![RowRange::new(2, 2)])]);
        assert_eq!(view_ids(&view), vec![1, 2, 4, 5]);
        assert_eq!(
            *core.matched_ids(),
            HashSet::from([ItemId::new(2), ItemId::new(4)])
        );
    }

    #[test]
    fn test_reopen_clears_before_new_rows() {
        let context = Arc::new(InMemoryContext::new());
        let (mut core, mut view) = engine(context);

        core.open(Some(album(5)));
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(ticket, vec![img(1), img(2)]);
        core.job_finished(ticket, Ok(()));
        pump(&mut core, &mut view);
        assert_eq!(view_ids(&view), vec![1, 2]);

        core.open(Some(album(9)));
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(
            ticket,
            vec![ItemRecordBuilder::image(10).with_album(9).build()],
        );
        core.job_finished(ticket, Ok(()));
        let (_, rows) = pump(&mut core, &mut view);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ViewEvent::RowsRemoved(vec![RowRange::new(0, 1)]));
        assert!(matches!(
            &rows[1],
            ViewEvent::RowsAppended(items) if items.len() == 1
        ));
        assert_eq!(view_ids(&view), vec![10]);
    }

    #[test]
    fn test_snapshot_reconcile_after_refresh() {
        let context = Arc::new(InMemoryContext::new());
        let (mut core, mut view) = engine(context);

        core.open(Some(album(5)));
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(ticket, [10, 20, 30, 40, 50].into_iter().map(img).collect());
        core.job_finished(ticket, Ok(()));
        pump(&mut core, &mut view);
        assert_eq!(view_ids(&view), vec![10, 20, 30, 40, 50]);

        // This consumer skips the event replay and instead diffs
        // against the post-refresh snapshot in one pass.
        core.refresh();
        let ticket = core.current_ticket().unwrap();
        core.job_chunk(ticket, vec![img(20), img(50)]);
        core.job_finished(ticket, Ok(()));
        core.take_events();

        let edits = view.reconcile(core.items().to_vec());
        assert_eq!(
            edits.removed,
            vec![RowRange::new(0, 0), RowRange::new(1, 2)]
        );
        assert!(edits.appended.is_empty());
        assert_eq!(view_ids(&view), vec![20, 50]);
        assert_eq!(view.index_of(ItemId::new(20)), Some(0));
        assert_eq!(view.index_of(ItemId::new(50)), Some(1));
    }
}
