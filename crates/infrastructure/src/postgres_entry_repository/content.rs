use formyard_core::ContentId;

use super::*;

impl PostgresEntryRepository {
    pub(super) async fn list_content_impl(
        &self,
        entry_ids: &[EntryId],
        field_ids: Option<&[FieldId]>,
    ) -> AppResult<Vec<ContentRow>> {
        if entry_ids.is_empty() || field_ids.is_some_and(<[FieldId]>::is_empty) {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ContentRowRecord>(
            r#"
            SELECT id, entry_id, field_id, content0, content1, content2, content3, content4
            FROM entry_content
            WHERE entry_id = ANY($1)
              AND ($2::BIGINT[] IS NULL OR field_id = ANY($2))
            ORDER BY entry_id ASC, field_id ASC
            "#,
        )
        .bind(raw_entry_ids(entry_ids))
        .bind(field_ids.map(|field_ids| {
            field_ids
                .iter()
                .map(|field_id| field_id.get())
                .collect::<Vec<_>>()
        }))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list entry content: {error}")))?;

        Ok(rows.into_iter().map(content_from_row).collect())
    }

    pub(super) async fn upsert_content_impl(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
        slots: ContentSlots,
    ) -> AppResult<ContentRow> {
        let [content0, content1, content2, content3, content4] = slots.into_array();
        let row = sqlx::query_as::<_, ContentRowRecord>(
            r#"
            INSERT INTO entry_content (
                entry_id,
                field_id,
                content0,
                content1,
                content2,
                content3,
                content4
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (entry_id, field_id) DO UPDATE
            SET
                content0 = EXCLUDED.content0,
                content1 = EXCLUDED.content1,
                content2 = EXCLUDED.content2,
                content3 = EXCLUDED.content3,
                content4 = EXCLUDED.content4
            RETURNING id, entry_id, field_id, content0, content1, content2, content3, content4
            "#,
        )
        .bind(entry_id.get())
        .bind(field_id.get())
        .bind(content0)
        .bind(content1)
        .bind(content2)
        .bind(content3)
        .bind(content4)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save content of field '{field_id}' for entry '{entry_id}': {error}"
            ))
        })?;

        Ok(content_from_row(row))
    }

    pub(super) async fn delete_content_impl(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM entry_content WHERE entry_id = $1 AND field_id = $2")
            .bind(entry_id.get())
            .bind(field_id.get())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete content of field '{field_id}' for entry '{entry_id}': {error}"
                ))
            })?;

        Ok(())
    }
}

fn content_from_row(row: ContentRowRecord) -> ContentRow {
    ContentRow {
        id: ContentId::new(row.id),
        entry_id: EntryId::new(row.entry_id),
        field_id: FieldId::new(row.field_id),
        slots: ContentSlots::new([
            row.content0,
            row.content1,
            row.content2,
            row.content3,
            row.content4,
        ]),
    }
}
